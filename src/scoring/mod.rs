//! Scoring: substitution matrices, gap costs, and the statistics used to
//! convert raw DP scores into bit scores and E-values (`SPEC_FULL.md` §4.1).

pub mod composition;
pub mod matrix;
pub mod stats;

use crate::config::Config;
use matrix::ScoreMatrix;
use stats::KarlinAltschulParams;

/// Everything the DP kernels and output assembler need to score and
/// statistically evaluate an alignment. One `ScoringContext` is built at
/// startup from [`Config`]; composition-based adjustment clones it with a
/// substituted matrix per target (§4.1).
#[derive(Debug, Clone)]
pub struct ScoringContext {
    matrix:           ScoreMatrix,
    gap_open:         i32,
    gap_extend:       i32,
    frame_shift_cost: i32,
    ka_params:        KarlinAltschulParams,
}

impl ScoringContext {
    /// Builds the process-wide scoring context from validated configuration.
    /// Falls back to BLOSUM62 if `matrix` names an unknown matrix, and to
    /// BLOSUM62's own Karlin-Altschul constants if `(matrix, gap_open,
    /// gap_extend)` names a combination [`KarlinAltschulParams::lookup`]
    /// doesn't carry a table entry for. Both fallbacks only matter for
    /// `Config::default()` and ad-hoc test construction: the real CLI path
    /// rejects an unsupported combination up front in
    /// [`crate::args::parse_extend_args`], so callers going through the
    /// binary never hit this fallback.
    #[must_use]
    pub fn from_config(config: &Config, matrix_name: &str) -> Self {
        let matrix = ScoreMatrix::by_name(matrix_name).unwrap_or_else(ScoreMatrix::blosum62);
        let ka_params = KarlinAltschulParams::lookup(matrix_name, config.gap_open, config.gap_extend)
            .unwrap_or_else(KarlinAltschulParams::blosum62_gapped_11_1);
        Self {
            matrix,
            gap_open: config.gap_open,
            gap_extend: config.gap_extend,
            frame_shift_cost: config.frame_shift_cost,
            ka_params,
        }
    }

    #[inline]
    #[must_use]
    pub fn score(&self, a: u8, b: u8) -> i32 {
        self.matrix.score(a, b)
    }

    #[inline]
    #[must_use]
    pub fn gap_open(&self) -> i32 {
        self.gap_open
    }

    #[inline]
    #[must_use]
    pub fn gap_extend(&self) -> i32 {
        self.gap_extend
    }

    #[inline]
    #[must_use]
    pub fn frame_shift_cost(&self) -> i32 {
        self.frame_shift_cost
    }

    #[inline]
    #[must_use]
    pub fn matrix(&self) -> &ScoreMatrix {
        &self.matrix
    }

    #[inline]
    #[must_use]
    pub fn karlin_altschul(&self) -> KarlinAltschulParams {
        self.ka_params
    }

    #[inline]
    #[must_use]
    pub fn bit_score(&self, raw_score: i32) -> f64 {
        self.ka_params.bit_score(raw_score)
    }

    /// The reverse of [`Self::bit_score`]: the fractional raw score that
    /// would produce `bit_score` (§4.1).
    #[inline]
    #[must_use]
    pub fn raw_score(&self, bit_score: f64) -> f64 {
        self.ka_params.raw_score(bit_score)
    }

    /// Converts a raw alignment score straight to an E-value, matching the
    /// collaborator contract named in §6.2/§4.1: `evalue(raw_score,
    /// query_len, target_len)`. The effective search space (`query_len *
    /// target_len`, in residues) is derived internally rather than asking
    /// the caller to compute it.
    #[inline]
    #[must_use]
    pub fn evalue(&self, raw_score: i32, query_len: u64, target_len: u64) -> f64 {
        let search_space = query_len as f64 * target_len as f64;
        self.ka_params.evalue_from_raw_score(raw_score, search_space)
    }

    /// Returns a copy of this context with its matrix replaced by a
    /// composition-adjusted one (§4.1); gap costs and frame-shift cost are
    /// unaffected, and `lambda` replaces the Karlin-Altschul `lambda` used
    /// for statistics to remain consistent with the adjusted matrix.
    #[must_use]
    pub fn with_adjusted_matrix(&self, matrix: ScoreMatrix, lambda: f64) -> Self {
        let mut ka_params = self.ka_params;
        ka_params.lambda = lambda;
        Self {
            matrix,
            gap_open: self.gap_open,
            gap_extend: self.gap_extend,
            frame_shift_cost: self.frame_shift_cost,
            ka_params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_defaults_to_blosum62() {
        let ctx = ScoringContext::from_config(&Config::default(), "blosum62");
        assert_eq!(ctx.score(b'A', b'A'), 4);
    }

    #[test]
    fn unknown_matrix_name_falls_back_to_blosum62() {
        let ctx = ScoringContext::from_config(&Config::default(), "not-a-matrix");
        assert_eq!(ctx.score(b'A', b'A'), 4);
    }
}
