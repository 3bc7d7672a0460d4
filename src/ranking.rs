//! Per-query target ranking and the range-culling interval table
//! (`SPEC_FULL.md` §4.4.1 stage 2, §4.4.3).

use crate::{config::Config, hit_grouper::ResolvedHit, model::Target};

/// Stable-sorts `targets` by `filter_score` descending, then retains the top
/// [`Config::rank_keep`] and drops any below `rank_ratio * best_score`
/// (§4.4.1 stage 2). Under `top_percent`, instead retains all targets with
/// `filter_score >= best_score * (1 - top_percent/100)`. Under
/// `config.range_culling`, ranks by query-range coverage instead (§4.4.3);
/// see [`range_cull_targets`].
pub fn rank_targets(targets: &mut Vec<Target>, hits: &[ResolvedHit], config: &Config) {
    if config.range_culling {
        range_cull_targets(targets, hits, config);
        return;
    }

    targets.sort_by(|a, b| b.filter_score.cmp(&a.filter_score));

    let Some(best) = targets.first().map(|t| t.filter_score) else {
        return;
    };

    if let Some(top_percent) = config.top_percent {
        let threshold = f64::from(best) * (1.0 - top_percent / 100.0);
        targets.retain(|t| f64::from(t.filter_score) >= threshold);
        return;
    }

    let keep = config.rank_keep();
    if targets.len() > keep {
        targets.truncate(keep);
    }
    let threshold = (f64::from(best) * config.rank_ratio).ceil() as i32;
    targets.retain(|t| t.filter_score >= threshold);
}

/// The query range a target's seed hits span, used as a stage-2 proxy for
/// its eventual HSP range (no HSP has been computed yet at this stage).
fn target_query_range(target: &Target, hits: &[ResolvedHit]) -> std::ops::Range<u32> {
    let slice = &hits[target.hit_range.clone()];
    let min = slice.iter().map(|h| h.query_position).min().unwrap_or(0);
    let max = slice.iter().map(|h| h.query_position).max().unwrap_or(0) + 1;
    min..max
}

/// Ranks `targets` by query-range coverage rather than raw score (§4.4.3):
/// visits targets best-score-first, keeping each one only if its query range
/// is not already `config.query_range_cover` percent covered by a
/// higher-scoring, already-kept target. Bounded by the same
/// [`Config::rank_keep`] window as the default ranking mode.
pub fn range_cull_targets(targets: &mut Vec<Target>, hits: &[ResolvedHit], config: &Config) {
    targets.sort_by(|a, b| b.filter_score.cmp(&a.filter_score));

    let query_len = hits.iter().map(|h| h.query_position + 1).max().unwrap_or(0);
    let mut table = RankingIntervalTable::new(query_len, (query_len / 10).max(1));

    let keep = config.rank_keep();
    let mut kept = Vec::with_capacity(targets.len().min(keep));
    for target in targets.drain(..) {
        if kept.len() >= keep {
            break;
        }
        let range = target_query_range(&target, hits);
        let coverage = table.coverage_fraction(range.clone(), target.filter_score);
        if kept.is_empty() || coverage * 100.0 < config.query_range_cover {
            table.insert(range, target.filter_score);
            kept.push(target);
        }
    }
    *targets = kept;
}

/// Re-sorts targets by `(evalue asc, score desc)`, the order used after the
/// score-only stage (§4.4.1 stage 4) and for final per-query output (§5).
pub fn sort_by_evalue_then_score(targets: &mut [Target]) {
    targets.sort_by(|a, b| {
        a.filter_evalue
            .partial_cmp(&b.filter_evalue)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.filter_score.cmp(&a.filter_score))
    });
}

/// Tracks, per interval of the query sequence, how many HSPs cover it and
/// the score range of those HSPs (§3 "Ranking interval table", §4.4.3).
#[derive(Debug, Clone)]
pub struct RankingIntervalTable {
    interval_len: u32,
    intervals:    Vec<IntervalStats>,
}

#[derive(Debug, Clone, Copy, Default)]
struct IntervalStats {
    count:     u32,
    min_score: i32,
    max_score: i32,
}

impl RankingIntervalTable {
    /// Partitions a query of `query_len` residues into intervals of
    /// `interval_len` residues each (the last interval may be shorter).
    #[must_use]
    pub fn new(query_len: u32, interval_len: u32) -> Self {
        let interval_len = interval_len.max(1);
        let n = query_len.div_ceil(interval_len).max(1) as usize;
        Self {
            interval_len,
            intervals: vec![IntervalStats::default(); n],
        }
    }

    #[inline]
    fn index_of(&self, pos: u32) -> usize {
        (pos / self.interval_len) as usize
    }

    /// Records that `range` is covered by an HSP scoring `score`, inserted
    /// in logarithmic time relative to the number of distinct intervals
    /// touched (each interval updated once).
    pub fn insert(&mut self, range: std::ops::Range<u32>, score: i32) {
        if range.end <= range.start {
            return;
        }
        let first = self.index_of(range.start);
        let last = self.index_of(range.end - 1).min(self.intervals.len() - 1);
        for interval in &mut self.intervals[first..=last] {
            interval.count += 1;
            interval.min_score = if interval.count == 1 { score } else { interval.min_score.min(score) };
            interval.max_score = interval.max_score.max(score);
        }
    }

    /// The fraction of `range`'s intervals already covered by an HSP scoring
    /// at or above `cutoff`, used by range culling to decide whether a new
    /// target's best HSP is already redundant (§4.4.3).
    #[must_use]
    pub fn coverage_fraction(&self, range: std::ops::Range<u32>, cutoff: i32) -> f64 {
        if range.end <= range.start {
            return 0.0;
        }
        let first = self.index_of(range.start);
        let last = self.index_of(range.end - 1).min(self.intervals.len() - 1);
        let total = last - first + 1;
        let covered = self.intervals[first..=last]
            .iter()
            .filter(|i| i.count > 0 && i.max_score >= cutoff)
            .count();
        covered as f64 / total as f64
    }
}
