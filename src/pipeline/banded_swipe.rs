//! The primary banded-swipe pipeline (`SPEC_FULL.md` §4.4.1): ungapped →
//! rank → score-only banded DP → cull → full banded DP with traceback →
//! inner cull.

use crate::{
    config::Config,
    culling::{cull_targets, inner_cull, truncate_to_max_target_seqs},
    dp::banded::banded_align,
    hit_grouper::ResolvedHit,
    model::{Hsp, QueryContext, Target},
    pipeline::Pipeline,
    ranking::{rank_targets, sort_by_evalue_then_score},
    scoring::{ScoringContext, composition::scoring_for_pair},
    stats::Stats,
};

pub struct BandedSwipePipeline;

/// One contiguous run of seed hits within a target whose diagonals lie
/// within `2 * band` of each other (§4.4.1 stage 3).
struct DiagonalCluster {
    d_min: i64,
    d_max: i64,
}

fn cluster_diagonals(diagonals: &mut [i64], band: i32) -> Vec<DiagonalCluster> {
    diagonals.sort_unstable();
    let mut clusters = Vec::new();
    let mut start = 0usize;
    while start < diagonals.len() {
        let mut end = start + 1;
        let mut max_d = diagonals[start];
        while end < diagonals.len() && diagonals[end] - max_d <= i64::from(2 * band) {
            max_d = diagonals[end];
            end += 1;
        }
        clusters.push(DiagonalCluster {
            d_min: diagonals[start],
            d_max: max_d,
        });
        start = end;
    }
    clusters
}

impl Pipeline for BandedSwipePipeline {
    fn run(
        &self, query: &QueryContext, mut targets: Vec<Target>, hits: &[ResolvedHit], target_seq: &impl Fn(u32) -> Vec<u8>, scoring: &ScoringContext, config: &Config,
        stats: &Stats,
    ) -> Vec<Target> {
        // Stage 1 (ungapped) already ran in the hit grouper; `filter_score`
        // is already populated on each target.

        // Stage 2: ranking.
        rank_targets(&mut targets, hits, config);

        let query_seq = query.frames.first().map(Vec::as_slice).unwrap_or(&[]);

        // Stage 3: score-only banded DP per diagonal cluster.
        for target in &mut targets {
            let subject = target_seq(target.subject_id);
            let pair_scoring = scoring_for_pair(config.composition_mode, scoring, query_seq, &subject, stats);
            let mut diagonals: Vec<i64> = hits[target.hit_range.clone()]
                .iter()
                .map(|h| h.target_position as i64 - i64::from(h.query_position))
                .collect();
            if diagonals.is_empty() {
                continue;
            }
            let clusters = cluster_diagonals(&mut diagonals, config.band);

            let mut best_score = 0i32;
            for cluster in &clusters {
                let d_min = cluster.d_min - i64::from(config.band);
                let d_end = cluster.d_max + i64::from(config.band);
                if let Some(result) = banded_align(query_seq, &subject, d_min, d_end, &pair_scoring, None, false, stats) {
                    best_score = best_score.max(result.score);
                }
            }
            target.filter_score = target.filter_score.max(best_score);
            target.filter_evalue = pair_scoring.evalue(target.filter_score, query_seq.len() as u64, subject.len() as u64);
        }

        // Stage 4: score-only culling.
        sort_by_evalue_then_score(&mut targets);
        cull_targets(&mut targets, config);

        // Stage 5: full banded DP with traceback.
        for target in &mut targets {
            let subject = target_seq(target.subject_id);
            let pair_scoring = scoring_for_pair(config.composition_mode, scoring, query_seq, &subject, stats);
            let mut diagonals: Vec<i64> = hits[target.hit_range.clone()]
                .iter()
                .map(|h| h.target_position as i64 - i64::from(h.query_position))
                .collect();
            if diagonals.is_empty() {
                continue;
            }
            let clusters = cluster_diagonals(&mut diagonals, config.band);

            for cluster in &clusters {
                let d_min = cluster.d_min - i64::from(config.band);
                let d_end = cluster.d_max + i64::from(config.band);
                if let Some(result) = banded_align(query_seq, &subject, d_min, d_end, &pair_scoring, None, true, stats)
                    && let Some(transcript) = result.transcript
                {
                    let rescored = transcript.rescore(query_seq, &subject, &pair_scoring);
                    let bit_score = pair_scoring.bit_score(result.score);
                    let hsp = Hsp {
                        frame: 0,
                        score: result.score,
                        evalue: pair_scoring.evalue(result.score, query_seq.len() as u64, subject.len() as u64),
                        bit_score,
                        query_range: result.query_range,
                        subject_range: result.subject_range,
                        query_source_range: 0..0,
                        transcript,
                        identities: rescored.identities,
                        mismatches: rescored.mismatches,
                        gap_openings: rescored.gap_openings,
                        positives: rescored.positives,
                        length: rescored.length,
                    };
                    target.hsps.push(hsp);
                }
            }
        }

        // Stage 6: inner culling.
        for target in &mut targets {
            inner_cull(target);
        }

        sort_by_evalue_then_score(&mut targets);
        truncate_to_max_target_seqs(&mut targets, config);

        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn pipeline_produces_hsp_for_perfect_self_hit() {
        let query_seq = b"MKTAYIAKQRQISFVKSHFSRQLEERLGLIEVQAPILSRVGDGTQDNLSGAEKAVQVKVKALPDAQFEVVHSLAKWKRQTLGQHDFSAGEGLYTHMKALRPDEDRL".to_vec();
        let subject = query_seq.clone();
        let query_ctx = QueryContext::new(0, vec![query_seq.clone()]);
        let scoring = ScoringContext::from_config(&Config::default(), "blosum62");
        let stats = Stats::default();
        let config = Config::default();

        let mut target = Target::new(0, 0..1);
        target.filter_score = 100;
        let hits = vec![ResolvedHit {
            subject_id:      0,
            query_position:  0,
            target_position: 0,
        }];

        let results = BandedSwipePipeline.run(&query_ctx, vec![target], &hits, &|_| subject.clone(), &scoring, &config, &stats);
        assert_eq!(results.len(), 1);
        assert!(!results[0].hsps.is_empty());
        assert_eq!(results[0].hsps[0].length as usize, query_seq.len());
    }
}
