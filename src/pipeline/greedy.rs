//! The greedy chaining pipeline (`SPEC_FULL.md` §4.4.2): an alternative to
//! [`super::banded_swipe::BandedSwipePipeline`] that anchors on ungapped
//! extensions, greedily chains them into an approximate HSP envelope per
//! subject, and runs one full banded DP with traceback over each chain's
//! envelope rather than clustering every seed diagonal.

use crate::{
    config::Config,
    culling::{cull_targets, inner_cull, truncate_to_max_target_seqs},
    dp::{banded::banded_align, ungapped::extend_ungapped},
    hit_grouper::ResolvedHit,
    model::{Hsp, QueryContext, Target, UngappedSegment},
    pipeline::Pipeline,
    ranking::{rank_targets, sort_by_evalue_then_score},
    scoring::{ScoringContext, composition::scoring_for_pair},
    stats::Stats,
};

pub struct GreedyPipeline;

/// A chain of compatible ungapped anchors, tracked by its combined score and
/// query/subject envelope.
struct Chain {
    query_start:  u32,
    query_end:    u32,
    subject_start: u64,
    subject_end:  u64,
    score:        i32,
}

/// Greedily chains `anchors` (already sorted by `query_start`) into
/// non-overlapping runs, extending a chain with the next anchor only when
/// doing so is still net-positive after paying one gap-open plus
/// gap-extend-per-residue-of-gap penalty for the intervening distance.
fn chain_anchors(mut anchors: Vec<UngappedSegment>, scoring: &ScoringContext) -> Vec<Chain> {
    anchors.sort_by_key(|a| a.query_start);

    let mut chains: Vec<Chain> = Vec::new();
    for anchor in anchors {
        let anchor_end_q = anchor.query_start + anchor.length;
        let anchor_end_t = anchor.target_start + u64::from(anchor.length);

        if let Some(last) = chains.last_mut()
            && anchor.query_start >= last.query_end
            && anchor.target_start >= last.subject_end
        {
            let query_gap = anchor.query_start - last.query_end;
            let subject_gap = anchor.target_start - last.subject_end;
            let gap_len = query_gap.max(subject_gap as u32);
            let penalty = if gap_len == 0 { 0 } else { scoring.gap_open() + scoring.gap_extend() * gap_len as i32 };
            if anchor.score > penalty {
                last.query_end = anchor_end_q;
                last.subject_end = anchor_end_t;
                last.score += anchor.score - penalty;
                continue;
            }
        }

        chains.push(Chain {
            query_start: anchor.query_start,
            query_end: anchor_end_q,
            subject_start: anchor.target_start,
            subject_end: anchor_end_t,
            score: anchor.score,
        });
    }
    chains
}

impl Pipeline for GreedyPipeline {
    fn run(
        &self, query: &QueryContext, mut targets: Vec<Target>, hits: &[ResolvedHit], target_seq: &impl Fn(u32) -> Vec<u8>, scoring: &ScoringContext, config: &Config,
        stats: &Stats,
    ) -> Vec<Target> {
        rank_targets(&mut targets, hits, config);

        let query_seq = query.frames.first().map(Vec::as_slice).unwrap_or(&[]);

        for target in &mut targets {
            let subject = target_seq(target.subject_id);
            let pair_scoring = scoring_for_pair(config.composition_mode, scoring, query_seq, &subject, stats);
            let anchors: Vec<UngappedSegment> = hits[target.hit_range.clone()]
                .iter()
                .filter_map(|h| extend_ungapped(query_seq, &subject, h.query_position as usize, h.target_position as usize, &pair_scoring, config.x_drop))
                .collect();
            if anchors.is_empty() {
                continue;
            }
            let chains = chain_anchors(anchors, &pair_scoring);
            let best_chain_score = chains.iter().map(|c| c.score).max().unwrap_or(0);
            target.filter_score = target.filter_score.max(best_chain_score);
        }

        sort_by_evalue_then_score(&mut targets);
        cull_targets(&mut targets, config);

        for target in &mut targets {
            let subject = target_seq(target.subject_id);
            let pair_scoring = scoring_for_pair(config.composition_mode, scoring, query_seq, &subject, stats);
            let anchors: Vec<UngappedSegment> = hits[target.hit_range.clone()]
                .iter()
                .filter_map(|h| extend_ungapped(query_seq, &subject, h.query_position as usize, h.target_position as usize, &pair_scoring, config.x_drop))
                .collect();
            if anchors.is_empty() {
                continue;
            }
            let chains = chain_anchors(anchors, &pair_scoring);

            for chain in &chains {
                let d_start = chain.subject_start as i64 - i64::from(chain.query_start);
                let d_end_anchor = chain.subject_end as i64 - i64::from(chain.query_end);
                let d_min = d_start.min(d_end_anchor) - i64::from(config.band);
                let d_end = d_start.max(d_end_anchor) + i64::from(config.band) + 1;

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
    fn chain_anchors_merges_colinear_runs() {
        let scoring = ScoringContext::from_config(&Config::default(), "blosum62");
        let anchors = vec![
            UngappedSegment {
                query_start: 0,
                target_start: 0,
                length: 10,
                score: 40,
            },
            UngappedSegment {
                query_start: 10,
                target_start: 10,
                length: 10,
                score: 40,
            },
        ];
        let chains = chain_anchors(anchors, &scoring);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].query_end, 20);
    }

    #[test]
    fn greedy_pipeline_produces_hsp_for_perfect_self_hit() {
        let query_seq = b"MKTAYIAKQRQISFVKSHFSRQLEERLGLIEVQAPILSRVGDGTQDNLSGAEKAVQVKVKALPDAQFEVVHSLAKWKRQTLGQHDFSAGEGLYTHMKALRPDEDRL".to_vec();
        let subject = query_seq.clone();
        let query_ctx = QueryContext::new(0, vec![query_seq.clone()]);
        let scoring = ScoringContext::from_config(&Config::default(), "blosum62");
        let stats = Stats::default();
        let config = Config::default();

        let target = Target::new(0, 0..1);
        let hits = vec![ResolvedHit {
            subject_id:      0,
            query_position:  0,
            target_position: 0,
        }];

        let results = GreedyPipeline.run(&query_ctx, vec![target], &hits, &|_| subject.clone(), &scoring, &config, &stats);
        assert_eq!(results.len(), 1);
        assert!(!results[0].hsps.is_empty());
    }
}
