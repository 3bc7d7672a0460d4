//! The validated, immutable configuration shared by every worker.
//!
//! Mirrors the teacher's split between raw `clap` arguments
//! (`args::ExtendArgs`) and a validated `Config` produced once at startup
//! (`args::parse_extend_args`). The pipeline and output layers only ever see
//! `Config`, never the raw CLI struct.

use crate::{output::OutputFormat, pipeline::PipelineKind};

/// Compositional-stats mode, matching DIAMOND-style codes 0..4 (§6.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositionMode {
    /// No composition-based adjustment.
    #[default]
    Off,
    /// Composition-based statistics only (log-ratio rescaling).
    LogRatio,
    /// Full matrix adjustment, always applied.
    MatrixAdjust,
    /// Matrix adjustment for global search only.
    MatrixAdjustGlobal,
    /// Conditional: matrix adjustment or log-ratio, chosen per target (§4.1).
    Conditional,
}

/// The full, validated configuration for one `extend` invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub max_target_seqs:     usize,
    pub rank_factor:         usize,
    pub rank_ratio:          f64,
    pub top_percent:         Option<f64>,
    pub min_bit_score:       Option<f64>,
    pub max_evalue:          f64,
    pub min_id:              Option<f64>,
    pub query_cover:         Option<f64>,
    pub subject_cover:       Option<f64>,
    pub max_hsps_per_target: Option<usize>,
    pub taxon_k:             Option<usize>,
    pub composition_mode:    CompositionMode,
    /// Per-frameshift penalty charged when rescoring a transcript containing
    /// a `FrameShiftForward`/`FrameShiftReverse` edit op (§3). Translated
    /// six-frame search itself is not implemented by this core (see
    /// `DESIGN.md`); this cost exists so transcripts produced by an upstream
    /// collaborator that does emit frameshift ops still rescore correctly.
    pub frame_shift_cost:    i32,
    pub band:                i32,
    pub x_drop:              i32,
    pub gap_open:             i32,
    pub gap_extend:           i32,
    pub threads:             usize,
    pub output_format:       OutputFormat,
    pub pipeline:            PipelineKind,
    pub range_culling:       bool,
    pub query_range_cover:   f64,
    pub reference_chunks:    usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_target_seqs:     25,
            rank_factor:         4,
            rank_ratio:          0.0,
            top_percent:         None,
            min_bit_score:       None,
            max_evalue:          10.0,
            min_id:              None,
            query_cover:         None,
            subject_cover:       None,
            max_hsps_per_target: None,
            taxon_k:             None,
            composition_mode:    CompositionMode::default(),
            frame_shift_cost:    15,
            band:                16,
            x_drop:              20,
            gap_open:            11,
            gap_extend:          1,
            threads:             1,
            output_format:       OutputFormat::Tabular,
            pipeline:            PipelineKind::BandedSwipe,
            range_culling:       false,
            query_range_cover:   90.0,
            reference_chunks:    1,
        }
    }
}

impl Config {
    /// Retained ranking size per `SPEC_FULL.md` §4.4.1 stage 2:
    /// `N = max(max_target_seqs * rank_factor, max_target_seqs)`.
    #[inline]
    #[must_use]
    pub fn rank_keep(&self) -> usize {
        (self.max_target_seqs * self.rank_factor).max(self.max_target_seqs)
    }
}
