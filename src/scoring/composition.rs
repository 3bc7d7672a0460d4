//! Composition-based matrix adjustment (`SPEC_FULL.md` §4.1).
//!
//! Builds a per-target substitution matrix whose implied amino-acid
//! marginals match the query's and target's observed compositions, while
//! holding the matrix's relative entropy close to the unadjusted matrix's
//! value. This is solved as an iterative-proportional-fitting (Sinkhorn-Knopp)
//! problem on the joint probability matrix, with an outer bisection search
//! over the scale parameter to satisfy the relative-entropy constraint —
//! the same two-level structure BLAST's composition-based-statistics solver
//! uses, without committing to its exact Newton/Cholesky numerics.

use crate::{
    config::CompositionMode,
    scoring::{ScoringContext, matrix::{RESIDUES, ScoreMatrix}},
    stats::Stats,
};

/// Number of standard residues the composition model fits over; the four
/// ambiguity columns of [`RESIDUES`] are excluded from the fit and carried
/// over unadjusted from the base matrix.
const N: usize = 20;

/// Robinson & Robinson (1991) background amino acid frequencies, in
/// [`RESIDUES`] order (`A R N D C Q E G H I L K M F P S T W Y V`).
pub const BACKGROUND_FREQS: [f64; N] = [
    0.0786, 0.0508, 0.0461, 0.0536, 0.0134, 0.0374, 0.0688, 0.0705, 0.0227, 0.0590, 0.0916, 0.0606, 0.0241, 0.0376,
    0.0480, 0.0673, 0.0535, 0.0108, 0.0296, 0.0687,
];

/// Counts amino acid occurrences in `seq` and normalizes to frequencies in
/// [`RESIDUES`] order. Residues outside the standard 20 are ignored.
#[must_use]
pub fn composition_of(seq: &[u8]) -> [f64; N] {
    let mut counts = [0u64; N];
    let mut total = 0u64;
    for &byte in seq {
        if let Some(i) = RESIDUES.iter().take(N).position(|&r| r.eq_ignore_ascii_case(&byte)) {
            counts[i] += 1;
            total += 1;
        }
    }
    let mut freqs = [0.0; N];
    if total > 0 {
        for (f, c) in freqs.iter_mut().zip(counts.iter()) {
            *f = *c as f64 / total as f64;
        }
    } else {
        freqs = BACKGROUND_FREQS;
    }
    freqs
}

/// Relative entropy (in nats) of a joint probability matrix against the
/// product of its own row/column marginals, `sum p_ij * ln(p_ij / (q_i r_j))`.
fn relative_entropy(joint: &[[f64; N]; N], row_marginal: &[f64; N], col_marginal: &[f64; N]) -> f64 {
    let mut h = 0.0;
    for i in 0..N {
        for j in 0..N {
            let p = joint[i][j];
            if p > 0.0 {
                h += p * (p / (row_marginal[i] * col_marginal[j])).ln();
            }
        }
    }
    h
}

/// Builds the starting joint distribution `p_ij ∝ background_i * background_j
/// * exp(lambda * score_ij)`, normalized to sum to 1.
fn seed_joint(base: &ScoreMatrix, lambda: f64, background: &[f64; N]) -> [[f64; N]; N] {
    let mut p = [[0.0; N]; N];
    let mut total = 0.0;
    for i in 0..N {
        for j in 0..N {
            let s = f64::from(base.score(RESIDUES[i], RESIDUES[j]));
            let v = background[i] * background[j] * (lambda * s).exp();
            p[i][j] = v;
            total += v;
        }
    }
    if total > 0.0 {
        for row in &mut p {
            for v in row.iter_mut() {
                *v /= total;
            }
        }
    }
    p
}

/// Iterative proportional fitting: alternately rescales rows to match
/// `query_freqs` and columns to match `target_freqs` until both marginals
/// are within `tol`, or returns `None` after `max_iters` rounds.
fn fit_marginals(mut p: [[f64; N]; N], query_freqs: &[f64; N], target_freqs: &[f64; N], max_iters: usize, tol: f64) -> Option<[[f64; N]; N]> {
    for _ in 0..max_iters {
        for i in 0..N {
            let row_sum: f64 = p[i].iter().sum();
            if row_sum > 0.0 {
                let scale = query_freqs[i] / row_sum;
                for v in &mut p[i] {
                    *v *= scale;
                }
            }
        }
        for j in 0..N {
            let col_sum: f64 = (0..N).map(|i| p[i][j]).sum();
            if col_sum > 0.0 {
                let scale = target_freqs[j] / col_sum;
                for row in &mut p {
                    row[j] *= scale;
                }
            }
        }

        let row_err = (0..N)
            .map(|i| (p[i].iter().sum::<f64>() - query_freqs[i]).abs())
            .fold(0.0, f64::max);
        let col_err = (0..N)
            .map(|j| ((0..N).map(|i| p[i][j]).sum::<f64>() - target_freqs[j]).abs())
            .fold(0.0, f64::max);
        if row_err < tol && col_err < tol {
            return Some(p);
        }
    }
    None
}

/// Converts a fitted joint probability matrix back to integer log-odds
/// scores: `round(ln(p_ij / (background_i * background_j)) / lambda)`.
fn rescale_to_matrix(joint: &[[f64; N]; N], background: &[f64; N], lambda: f64, fallback: &ScoreMatrix) -> ScoreMatrix {
    let mut rows = *fallback.rows();
    for i in 0..N {
        for j in 0..N {
            let p = joint[i][j];
            let denom = background[i] * background[j];
            if p > 0.0 && denom > 0.0 {
                rows[i][j] = ((p / denom).ln() / lambda).round() as i32;
            }
        }
    }
    ScoreMatrix::from_rows(rows)
}

/// Result of a successful composition-based adjustment.
#[derive(Debug, Clone)]
pub struct AdjustedMatrix {
    pub matrix: ScoreMatrix,
    pub lambda: f64,
}

/// Builds a per-target adjusted matrix whose marginals match `query_freqs`
/// and `target_freqs` and whose relative entropy is close to
/// `target_relative_entropy` (normally the unadjusted matrix's own relative
/// entropy, so adjustment redistributes score mass without inflating it).
///
/// Runs a bounded bisection search over the scale parameter `lambda`,
/// re-fitting IPF marginals at each probe. Returns `None` — recorded as
/// [`crate::error::Recoverable::MatrixAdjustNonConvergence`] on `stats` — if
/// IPF fails to converge at any probe point or bisection exhausts its budget
/// without reaching `tol_entropy`; callers fall back to log-ratio rescaling
/// per the §4.1 fallback chain.
#[must_use]
pub fn adjust_matrix(
    base: &ScoreMatrix, query_freqs: &[f64; N], target_freqs: &[f64; N], target_relative_entropy: f64, stats: &Stats,
) -> Option<AdjustedMatrix> {
    const IPF_MAX_ITERS: usize = 200;
    const IPF_TOL: f64 = 1e-9;
    const BISECTION_MAX_ITERS: usize = 40;
    const ENTROPY_TOL: f64 = 1e-4;

    let mut lo = 0.001;
    let mut hi = 2.0;

    for _ in 0..BISECTION_MAX_ITERS {
        let mid = 0.5 * (lo + hi);
        let seeded = seed_joint(base, mid, &BACKGROUND_FREQS);
        let Some(fitted) = fit_marginals(seeded, query_freqs, target_freqs, IPF_MAX_ITERS, IPF_TOL) else {
            stats.record_matrix_adjust_non_convergence();
            return None;
        };
        let h = relative_entropy(&fitted, query_freqs, target_freqs);
        if (h - target_relative_entropy).abs() < ENTROPY_TOL {
            return Some(AdjustedMatrix {
                matrix: rescale_to_matrix(&fitted, &BACKGROUND_FREQS, mid, base),
                lambda: mid,
            });
        }
        // Relative entropy increases monotonically with lambda.
        if h < target_relative_entropy {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    stats.record_matrix_adjust_non_convergence();
    None
}

/// The simpler CBS "log-ratio" rescaling (§4.1): scales every raw score by
/// the ratio of observed-to-background composition rather than solving a
/// constrained marginal-fitting problem. Always converges, used as the
/// fallback for [`adjust_matrix`] non-convergence and as the full behavior of
/// `CompositionMode::LogRatio`.
#[must_use]
pub fn log_ratio_rescale(base: &ScoreMatrix, query_freqs: &[f64; N], target_freqs: &[f64; N]) -> ScoreMatrix {
    let mut rows = *base.rows();
    for i in 0..N {
        let qi = query_freqs[i].max(1e-6) / BACKGROUND_FREQS[i];
        for j in 0..N {
            let rj = target_freqs[j].max(1e-6) / BACKGROUND_FREQS[j];
            let ratio = (qi * rj).ln();
            rows[i][j] += (ratio / std::f64::consts::LN_2).round() as i32;
        }
    }
    ScoreMatrix::from_rows(rows)
}

/// The unadjusted matrix's own relative entropy against background
/// marginals at `lambda` — the "hold entropy roughly constant" target that
/// [`adjust_matrix`] bisects against.
#[must_use]
pub fn baseline_relative_entropy(base: &ScoreMatrix, lambda: f64) -> f64 {
    relative_entropy(&seed_joint(base, lambda, &BACKGROUND_FREQS), &BACKGROUND_FREQS, &BACKGROUND_FREQS)
}

/// Runs [`adjust_matrix`], falling back to [`log_ratio_rescale`] if it
/// doesn't converge (the §4.1 fallback chain's first two links).
fn adjust_or_log_ratio(base: &ScoringContext, query_freqs: &[f64; N], target_freqs: &[f64; N], stats: &Stats) -> ScoringContext {
    let lambda = base.karlin_altschul().lambda;
    let target_entropy = baseline_relative_entropy(base.matrix(), lambda);
    if let Some(adjusted) = adjust_matrix(base.matrix(), query_freqs, target_freqs, target_entropy, stats) {
        stats.record_matrix_adjust_applied();
        base.with_adjusted_matrix(adjusted.matrix, adjusted.lambda)
    } else {
        let matrix = log_ratio_rescale(base.matrix(), query_freqs, target_freqs);
        base.with_adjusted_matrix(matrix, lambda)
    }
}

/// Whether `freqs` departs from background composition by more than 5
/// percentage points in any residue — the threshold [`CompositionMode::Conditional`]
/// uses to decide whether a target is "compositionally unusual" enough to
/// warrant matrix adjustment at all.
fn deviates_from_background(freqs: &[f64; N]) -> bool {
    freqs.iter().zip(BACKGROUND_FREQS.iter()).any(|(f, b)| (f - b).abs() > 0.05)
}

/// Picks the per-`(query, target)` scoring context for one HSP computation
/// according to `mode` (§4.1, §6.5 `--comp-based-stats`), applying the
/// adjusted -> log-ratio -> unadjusted fallback chain. Shared by both
/// pipelines so `--comp-based-stats` behaves identically regardless of
/// `--pipeline` (§8 scenario 5).
#[must_use]
pub fn scoring_for_pair(mode: CompositionMode, base: &ScoringContext, query: &[u8], target: &[u8], stats: &Stats) -> ScoringContext {
    match mode {
        CompositionMode::Off => base.clone(),
        CompositionMode::LogRatio => {
            let query_freqs = composition_of(query);
            let target_freqs = composition_of(target);
            let matrix = log_ratio_rescale(base.matrix(), &query_freqs, &target_freqs);
            base.with_adjusted_matrix(matrix, base.karlin_altschul().lambda)
        }
        CompositionMode::MatrixAdjust => adjust_or_log_ratio(base, &composition_of(query), &composition_of(target), stats),
        // "Global": the adjustment is driven by the query's own composition
        // against background only, independent of each individual target.
        CompositionMode::MatrixAdjustGlobal => adjust_or_log_ratio(base, &composition_of(query), &BACKGROUND_FREQS, stats),
        CompositionMode::Conditional => {
            let query_freqs = composition_of(query);
            let target_freqs = composition_of(target);
            if deviates_from_background(&query_freqs) || deviates_from_background(&target_freqs) {
                adjust_or_log_ratio(base, &query_freqs, &target_freqs, stats)
            } else {
                base.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composition_of_uniform_sequence_peaks_one_residue() {
        let freqs = composition_of(b"AAAA");
        assert!((freqs[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn adjust_matrix_converges_for_background_composition() {
        let stats = Stats::default();
        let base = ScoreMatrix::blosum62();
        let h0 = relative_entropy(
            &seed_joint(&base, 0.3176, &BACKGROUND_FREQS),
            &BACKGROUND_FREQS,
            &BACKGROUND_FREQS,
        );
        let result = adjust_matrix(&base, &BACKGROUND_FREQS, &BACKGROUND_FREQS, h0, &stats);
        assert!(result.is_some());
        assert_eq!(stats.matrix_adjust_non_convergence_count(), 0);
    }

    #[test]
    fn log_ratio_rescale_is_identity_for_background_composition() {
        let base = ScoreMatrix::blosum62();
        let adjusted = log_ratio_rescale(&base, &BACKGROUND_FREQS, &BACKGROUND_FREQS);
        assert_eq!(adjusted.score(b'A', b'A'), base.score(b'A', b'A'));
    }

    #[test]
    fn scoring_for_pair_is_unchanged_when_mode_is_off() {
        let base = ScoringContext::from_config(&crate::config::Config::default(), "blosum62");
        let stats = Stats::default();
        let adjusted = scoring_for_pair(CompositionMode::Off, &base, b"AAAAKKKK", b"WWWWCCCC", &stats);
        assert_eq!(adjusted.score(b'A', b'A'), base.score(b'A', b'A'));
    }

    #[test]
    fn scoring_for_pair_adjusts_matrix_for_skewed_composition() {
        let base = ScoringContext::from_config(&crate::config::Config::default(), "blosum62");
        let stats = Stats::default();
        let skewed_query = b"WWWWWWWWWWWWWWWWWWWW";
        let skewed_target = b"CCCCCCCCCCCCCCCCCCCC";
        let adjusted = scoring_for_pair(CompositionMode::MatrixAdjust, &base, skewed_query, skewed_target, &stats);
        // A strongly skewed pair should pick up a different W-vs-C score than
        // the unadjusted matrix once composition bias is applied.
        assert_ne!(adjusted.score(b'W', b'C'), base.score(b'W', b'C'));
    }

    #[test]
    fn conditional_mode_leaves_background_like_pairs_unadjusted() {
        let base = ScoringContext::from_config(&crate::config::Config::default(), "blosum62");
        let stats = Stats::default();
        let query = b"MKTAYIAKQRQISFVKSHFSRQLEERLGLIEVQAPILSRVGDGTQDNLSGAEKAVQVKV";
        let adjusted = scoring_for_pair(CompositionMode::Conditional, &base, query, query, &stats);
        assert_eq!(adjusted.score(b'A', b'A'), base.score(b'A', b'A'));
    }

    #[test]
    fn matrix_adjust_mode_records_one_application_and_lowers_alignment_score() {
        let base = ScoringContext::from_config(&crate::config::Config::default(), "blosum62");
        let stats = Stats::default();
        let query: Vec<u8> = b"KR".iter().cycle().take(200).copied().collect();
        let target: Vec<u8> = b"DE".iter().cycle().take(200).copied().collect();
        let adjusted = scoring_for_pair(CompositionMode::MatrixAdjust, &base, &query, &target, &stats);
        assert_eq!(stats.matrix_adjust_applied_count(), 1);
        let unadjusted_score: i32 = query.iter().zip(target.iter()).map(|(q, t)| base.score(*q, *t)).sum();
        let adjusted_score: i32 = query.iter().zip(target.iter()).map(|(q, t)| adjusted.score(*q, *t)).sum();
        assert!(adjusted_score < unadjusted_score);
    }
}
