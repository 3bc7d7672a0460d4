//! The two interchangeable per-query extension pipelines
//! (`SPEC_FULL.md` §4.4).

pub mod banded_swipe;
pub mod greedy;

use crate::{config::Config, model::{QueryContext, Target}, scoring::ScoringContext, stats::Stats};

/// Which pipeline variant a query is run through; selected per query based
/// on heuristics about length, sensitivity, and whether traceback is needed
/// (§4.4, left as a single process-wide configuration knob here rather than
/// a per-query heuristic — see `DESIGN.md`'s Open Question resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineKind {
    #[default]
    BandedSwipe,
    Greedy,
}

/// Common contract both pipelines satisfy: consume a query's grouped
/// targets (with seed hits already attached) and produce the final,
/// inner-culled HSP sets attached to each target.
pub trait Pipeline {
    fn run(&self, query: &QueryContext, targets: Vec<Target>, hits: &[crate::hit_grouper::ResolvedHit], target_seq: &impl Fn(u32) -> Vec<u8>, scoring: &ScoringContext, config: &Config, stats: &Stats) -> Vec<Target>;
}

/// Dispatches to the configured pipeline implementation.
#[must_use]
pub fn run_pipeline(
    kind: PipelineKind, query: &QueryContext, targets: Vec<Target>, hits: &[crate::hit_grouper::ResolvedHit], target_seq: &impl Fn(u32) -> Vec<u8>, scoring: &ScoringContext,
    config: &Config, stats: &Stats,
) -> Vec<Target> {
    match kind {
        PipelineKind::BandedSwipe => banded_swipe::BandedSwipePipeline.run(query, targets, hits, target_seq, scoring, config, stats),
        PipelineKind::Greedy => greedy::GreedyPipeline.run(query, targets, hits, target_seq, scoring, config, stats),
    }
}
