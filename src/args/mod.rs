//! Command-line surface for the `extend` binary (`SPEC_FULL.md` §6.5) and
//! its validation into an immutable [`Config`], mirroring the teacher's
//! split between a raw `clap` struct and a `parse_*_args` validation pass
//! producing a `Parsed*Args`/`*Config` pair (see `aligner::arg_parsing`).

use crate::{
    config::{CompositionMode, Config},
    output::OutputFormat,
    pipeline::PipelineKind,
    scoring::stats::KarlinAltschulParams,
};
use clap::{CommandFactory, Parser, ValueEnum, builder::PossibleValue, error::ErrorKind};
use std::path::PathBuf;

/// Aborts clap with a given error `message` due to a custom validation
/// failure discovered after parsing (value ranges that interact across
/// flags, e.g. `gap_extend > gap_open`).
pub(crate) fn abort_clap(kind: ErrorKind, message: impl std::fmt::Display) -> ! {
    ExtendArgs::command().error(kind, message).exit()
}

/// The raw, unvalidated command-line arguments for the `extend` subcommand.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct ExtendArgs {
    /// Path to the reference (target) FASTA database
    pub database: PathBuf,

    /// Path to the query FASTA/FASTQ file
    pub query: PathBuf,

    /// Path to the raw `SeedHit` stream from the seeding stage (§6.1)
    pub seeds: PathBuf,

    #[arg(long, alias = "out")]
    /// Output filepath. Prints to STDOUT if not provided
    pub output: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "tabular")]
    /// Output record format
    pub outfmt: OutfmtArg,

    #[arg(long, default_value = "blosum62")]
    /// Substitution matrix name (blosum45/50/62/80/90, pam30/70)
    pub matrix: String,

    #[arg(long, default_value_t = 11)]
    /// Gap-open penalty, expressed as a positive value
    pub gap_open: i32,

    #[arg(long, default_value_t = 1)]
    /// Gap-extend penalty, expressed as a positive value
    pub gap_extend: i32,

    #[arg(long, default_value_t = 20)]
    /// X-drop threshold for ungapped extension
    pub x_drop: i32,

    #[arg(long, default_value_t = 16)]
    /// Band half-width for banded gapped extension
    pub band: i32,

    #[arg(long, default_value_t = 25)]
    /// Maximum number of target sequences to report per query
    pub max_target_seqs: usize,

    #[arg(long)]
    /// Keep only targets within this percent of the best score, instead of
    /// `max_target_seqs`
    pub top_percent: Option<f64>,

    #[arg(long, default_value_t = 10.0)]
    /// Maximum reported E-value
    pub max_evalue: f64,

    #[arg(long)]
    /// Minimum percent identity for a reported HSP
    pub min_id: Option<f64>,

    #[arg(long)]
    /// Minimum percent query coverage for a reported HSP
    pub query_cover: Option<f64>,

    #[arg(long)]
    /// Minimum percent subject coverage for a reported HSP
    pub subject_cover: Option<f64>,

    #[arg(long)]
    /// Minimum bit score for a reported HSP
    pub min_bit_score: Option<f64>,

    #[arg(long)]
    /// Maximum number of HSPs reported per target
    pub max_hsps_per_target: Option<usize>,

    #[arg(long)]
    /// Maximum targets retained per distinct taxon id
    pub taxon_k: Option<usize>,

    #[arg(long, value_enum, default_value = "off")]
    /// Compositional-stats mode (§6.5 codes 0..4)
    pub comp_based_stats: CompBasedStatsArg,

    #[arg(long, default_value_t = 15)]
    /// Per-frameshift penalty applied when rescoring a transcript containing
    /// a frameshift edit operation
    pub frame_shift_cost: i32,

    #[arg(long, value_enum, default_value = "banded-swipe")]
    /// Extension pipeline variant
    pub pipeline: PipelineArg,

    #[arg(long, default_value_t = num_cpus::get())]
    /// Number of worker threads
    pub threads: usize,

    #[arg(long)]
    /// Rank and cull targets by query-range coverage instead of raw score
    /// (§4.4.3)
    pub range_culling: bool,

    #[arg(long, default_value_t = 90.0)]
    /// Minimum percent of the query an already-covered interval must reach
    /// before a lower-scoring target in it is culled, under `--range-culling`
    pub query_range_cover: f64,

    #[arg(long, default_value_t = 1)]
    /// Number of reference chunks to process the database in; intermediate
    /// per-chunk records are merged by join-blocks into one ranked output
    pub reference_chunks: usize,

    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    /// Increase logging verbosity; repeatable
    pub verbose: u8,
}

/// The validated configuration plus the resolved input paths, analogous to
/// the teacher's `ParsedAlignerArgs`.
pub struct ParsedExtendArgs {
    pub database:    PathBuf,
    pub query:       PathBuf,
    pub seeds:       PathBuf,
    pub output:      Option<PathBuf>,
    pub matrix_name: String,
    pub config:      Config,
}

/// Parses and validates `args` into a [`ParsedExtendArgs`]. Calls
/// [`abort_clap`] if `gap_extend` exceeds `gap_open`, if `top_percent` is
/// outside `(0, 100]`, or if `(matrix, gap_open, gap_extend)` names a
/// combination this core carries no Karlin-Altschul statistics table entry
/// for (§4.1).
///
/// ## Errors
///
/// Propagates any error constructing the matrix lookup is deferred to
/// [`crate::scoring::ScoringContext::from_config`]; this function performs
/// only flag-combination validation, not file I/O.
#[must_use]
pub fn parse_extend_args(args: ExtendArgs) -> ParsedExtendArgs {
    if args.gap_extend > args.gap_open {
        abort_clap(
            ErrorKind::InvalidValue,
            format!("--gap-extend ({}) must not exceed --gap-open ({})", args.gap_extend, args.gap_open),
        );
    }

    if let Some(top_percent) = args.top_percent
        && !(0.0..=100.0).contains(&top_percent)
    {
        abort_clap(ErrorKind::InvalidValue, "--top-percent must be within (0, 100]");
    }

    if KarlinAltschulParams::lookup(&args.matrix, args.gap_open, args.gap_extend).is_none() {
        abort_clap(
            ErrorKind::InvalidValue,
            format!(
                "no tabulated Karlin-Altschul statistics for matrix '{}' with gap-open {} / gap-extend {}",
                args.matrix, args.gap_open, args.gap_extend
            ),
        );
    }

    let config = Config {
        max_target_seqs: args.max_target_seqs,
        top_percent: args.top_percent,
        min_bit_score: args.min_bit_score,
        max_evalue: args.max_evalue,
        min_id: args.min_id,
        query_cover: args.query_cover,
        subject_cover: args.subject_cover,
        max_hsps_per_target: args.max_hsps_per_target,
        taxon_k: args.taxon_k,
        composition_mode: args.comp_based_stats.into(),
        frame_shift_cost: args.frame_shift_cost,
        band: args.band,
        x_drop: args.x_drop,
        gap_open: args.gap_open,
        gap_extend: args.gap_extend,
        threads: args.threads.max(1),
        output_format: args.outfmt.into(),
        pipeline: args.pipeline.into(),
        range_culling: args.range_culling,
        query_range_cover: args.query_range_cover,
        reference_chunks: args.reference_chunks.max(1),
        ..Config::default()
    };

    ParsedExtendArgs {
        database: args.database,
        query: args.query,
        seeds: args.seeds,
        output: args.output,
        matrix_name: args.matrix,
        config,
    }
}

/// clap-facing mirror of [`OutputFormat`] (`Intermediate`/`Daa` share the
/// single `Daa` choice here; blocked mode selects `Intermediate` internally).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutfmtArg {
    Tabular,
    Paf,
    Sam,
    Pairwise,
    Xml,
    Json,
    Daa,
}

impl ValueEnum for OutfmtArg {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            Self::Tabular,
            Self::Paf,
            Self::Sam,
            Self::Pairwise,
            Self::Xml,
            Self::Json,
            Self::Daa,
        ]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(match self {
            Self::Tabular => PossibleValue::new("tabular"),
            Self::Paf => PossibleValue::new("paf"),
            Self::Sam => PossibleValue::new("sam"),
            Self::Pairwise => PossibleValue::new("pairwise"),
            Self::Xml => PossibleValue::new("xml"),
            Self::Json => PossibleValue::new("json"),
            Self::Daa => PossibleValue::new("daa"),
        })
    }
}

impl From<OutfmtArg> for OutputFormat {
    fn from(value: OutfmtArg) -> Self {
        match value {
            OutfmtArg::Tabular => OutputFormat::Tabular,
            OutfmtArg::Paf => OutputFormat::Paf,
            OutfmtArg::Sam => OutputFormat::Sam,
            OutfmtArg::Pairwise => OutputFormat::Pairwise,
            OutfmtArg::Xml => OutputFormat::Xml,
            OutfmtArg::Json => OutputFormat::Json,
            OutfmtArg::Daa => OutputFormat::Daa,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompBasedStatsArg {
    Off,
    LogRatio,
    MatrixAdjust,
    MatrixAdjustGlobal,
    Conditional,
}

impl ValueEnum for CompBasedStatsArg {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            Self::Off,
            Self::LogRatio,
            Self::MatrixAdjust,
            Self::MatrixAdjustGlobal,
            Self::Conditional,
        ]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(match self {
            Self::Off => PossibleValue::new("off").alias("0"),
            Self::LogRatio => PossibleValue::new("log-ratio").alias("1"),
            Self::MatrixAdjust => PossibleValue::new("matrix-adjust").alias("2"),
            Self::MatrixAdjustGlobal => PossibleValue::new("matrix-adjust-global").alias("3"),
            Self::Conditional => PossibleValue::new("conditional").alias("4"),
        })
    }
}

impl From<CompBasedStatsArg> for CompositionMode {
    fn from(value: CompBasedStatsArg) -> Self {
        match value {
            CompBasedStatsArg::Off => CompositionMode::Off,
            CompBasedStatsArg::LogRatio => CompositionMode::LogRatio,
            CompBasedStatsArg::MatrixAdjust => CompositionMode::MatrixAdjust,
            CompBasedStatsArg::MatrixAdjustGlobal => CompositionMode::MatrixAdjustGlobal,
            CompBasedStatsArg::Conditional => CompositionMode::Conditional,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineArg {
    BandedSwipe,
    Greedy,
}

impl ValueEnum for PipelineArg {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::BandedSwipe, Self::Greedy]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(match self {
            Self::BandedSwipe => PossibleValue::new("banded-swipe"),
            Self::Greedy => PossibleValue::new("greedy"),
        })
    }
}

impl From<PipelineArg> for PipelineKind {
    fn from(value: PipelineArg) -> Self {
        match value {
            PipelineArg::BandedSwipe => PipelineKind::BandedSwipe,
            PipelineArg::Greedy => PipelineKind::Greedy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> ExtendArgs {
        ExtendArgs {
            database: "db.fasta".into(),
            query: "q.fasta".into(),
            seeds: "hits.bin".into(),
            output: None,
            outfmt: OutfmtArg::Tabular,
            matrix: "blosum62".into(),
            gap_open: 11,
            gap_extend: 1,
            x_drop: 20,
            band: 16,
            max_target_seqs: 25,
            top_percent: None,
            max_evalue: 10.0,
            min_id: None,
            query_cover: None,
            subject_cover: None,
            min_bit_score: None,
            max_hsps_per_target: None,
            taxon_k: None,
            comp_based_stats: CompBasedStatsArg::Off,
            frame_shift_cost: 15,
            pipeline: PipelineArg::BandedSwipe,
            threads: 1,
            range_culling: false,
            query_range_cover: 90.0,
            reference_chunks: 1,
            verbose: 0,
        }
    }

    #[test]
    fn valid_args_produce_matching_config() {
        let parsed = parse_extend_args(base_args());
        assert_eq!(parsed.config.gap_open, 11);
        assert_eq!(parsed.config.output_format, OutputFormat::Tabular);
    }

    #[test]
    fn range_culling_flag_is_threaded_into_config() {
        let mut args = base_args();
        args.range_culling = true;
        args.query_range_cover = 75.0;
        let parsed = parse_extend_args(args);
        assert!(parsed.config.range_culling);
        assert_eq!(parsed.config.query_range_cover, 75.0);
    }

    #[test]
    fn unsupported_matrix_gap_cost_combination_is_rejected() {
        // blosum62 has no tabulated entry at gap-open 7 / gap-extend 1; this
        // would previously abort via `abort_clap`, which calls `process::exit`
        // under clap's error path in a real binary. We only assert the
        // lookup itself reports the combination as unsupported, since
        // exercising `abort_clap` here would terminate the test process.
        assert!(KarlinAltschulParams::lookup("blosum62", 7, 1).is_none());
    }
}
