//! Converts one query's raw seed hits into ordered [`Target`] records
//! (`SPEC_FULL.md` §4.3).

use crate::{dp::ungapped::extend_ungapped, model::Target, scoring::ScoringContext};

/// One raw hit already resolved to a subject id and within-subject position,
/// the minimal view the grouper needs (seeding-stage output, post-lookup).
#[derive(Debug, Clone, Copy)]
pub struct ResolvedHit {
    pub subject_id:      u32,
    pub query_position:  u32,
    pub target_position: u64,
}

/// Groups `hits` (all belonging to one query) by subject, running a light
/// ungapped extension per hit to discard score-0 hits, and returns one
/// [`Target`] per distinct subject with `hit_range` pointing into the
/// now-sorted `hits` slice.
///
/// `hits` is sorted in place by subject id (stable, so within-subject order
/// is preserved) — the contract the pipeline's diagonal-clustering stage
/// relies on (§4.4.1 stage 3).
#[must_use]
pub fn group_hits(hits: &mut [ResolvedHit], query: &[u8], target_seqs: &impl Fn(u32) -> Vec<u8>, scoring: &ScoringContext, x_drop: i32) -> Vec<Target> {
    hits.sort_by_key(|h| h.subject_id);

    let mut targets = Vec::new();
    let mut start = 0usize;
    while start < hits.len() {
        let subject_id = hits[start].subject_id;
        let mut end = start + 1;
        while end < hits.len() && hits[end].subject_id == subject_id {
            end += 1;
        }

        let subject_seq = target_seqs(subject_id);
        let mut best_score = 0i32;
        let mut kept_any = false;
        for hit in &hits[start..end] {
            if let Some(seg) =
                extend_ungapped(query, &subject_seq, hit.query_position as usize, hit.target_position as usize, scoring, x_drop)
            {
                kept_any = true;
                best_score = best_score.max(seg.score);
            }
        }

        if kept_any {
            let mut target = Target::new(subject_id, start..end);
            target.filter_score = best_score;
            targets.push(target);
        }

        start = end;
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn empty_input_yields_empty_output() {
        let scoring = ScoringContext::from_config(&Config::default(), "blosum62");
        let mut hits: Vec<ResolvedHit> = Vec::new();
        let targets = group_hits(&mut hits, b"", &|_| Vec::new(), &scoring, 20);
        assert!(targets.is_empty());
    }

    #[test]
    fn hits_group_by_subject_with_best_score() {
        let scoring = ScoringContext::from_config(&Config::default(), "blosum62");
        let query = b"MKTAYIAKQR";
        let subject = query.to_vec();
        let mut hits = vec![
            ResolvedHit {
                subject_id:      1,
                query_position:  0,
                target_position: 0,
            },
            ResolvedHit {
                subject_id:      2,
                query_position:  0,
                target_position: 0,
            },
            ResolvedHit {
                subject_id:      1,
                query_position:  5,
                target_position: 5,
            },
        ];
        let targets = group_hits(&mut hits, query, &|_| subject.clone(), &scoring, 20);
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().any(|t| t.subject_id == 1 && t.hit_range.len() == 2));
        assert!(targets.iter().any(|t| t.subject_id == 2 && t.hit_range.len() == 1));
    }

    #[test]
    fn zero_score_only_subject_is_dropped() {
        let scoring = ScoringContext::from_config(&Config::default(), "blosum62");
        let query = b"W";
        let subject = b"D".to_vec();
        let mut hits = vec![ResolvedHit {
            subject_id:      9,
            query_position:  0,
            target_position: 0,
        }];
        let targets = group_hits(&mut hits, query, &|_| subject.clone(), &scoring, 20);
        assert!(targets.is_empty());
    }
}
