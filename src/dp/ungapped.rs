//! X-drop ungapped extension from a seed (`SPEC_FULL.md` §4.2, §4.3).

use crate::{model::UngappedSegment, scoring::ScoringContext};

/// Extends a seed hit in both directions along one diagonal with no gaps,
/// stopping each direction once the running score falls `x_drop` below the
/// best score seen so far in that direction. Returns `None` if the best
/// score never rises above zero (callers discard zero-score hits, §4.3).
#[must_use]
pub fn extend_ungapped(
    query: &[u8], target: &[u8], query_seed: usize, target_seed: usize, scoring: &ScoringContext, x_drop: i32,
) -> Option<UngappedSegment> {
    let (left_start_q, left_start_t, left_score) = extend_left(query, target, query_seed, target_seed, scoring, x_drop);
    let (right_end_q, right_end_t, right_score) = extend_right(query, target, query_seed, target_seed, scoring, x_drop);

    let score = left_score + right_score;
    if score <= 0 {
        return None;
    }

    let length = (right_end_q - left_start_q) as u32;
    Some(UngappedSegment {
        query_start: left_start_q as u32,
        target_start: left_start_t as u64,
        length,
        score,
    })
}

/// Walks backward from `(q, t)` (exclusive of the seed position itself, which
/// is scored by the caller combining both halves at the seed residue) while
/// tracking the best prefix score under an x-drop bound. Returns the
/// leftmost included position and the best score achieved in this direction,
/// including the seed residue.
fn extend_left(query: &[u8], target: &[u8], query_seed: usize, target_seed: usize, scoring: &ScoringContext, x_drop: i32) -> (usize, usize, i32) {
    let mut score = 0i32;
    let mut best = i32::MIN;
    let mut best_q = query_seed;
    let mut best_t = target_seed;
    let mut q = query_seed;
    let mut t = target_seed;

    loop {
        if q == 0 || t == 0 {
            break;
        }
        q -= 1;
        t -= 1;
        score += scoring.score(query[q], target[t]);
        if score > best {
            best = score;
            best_q = q;
            best_t = t;
        } else if best - score > x_drop {
            break;
        }
    }

    (best_q, best_t, best.max(0))
}

/// Walks forward from `(q, t)` inclusive of the seed residue, mirroring
/// [`extend_left`]. Returns the exclusive end positions and the best score.
fn extend_right(query: &[u8], target: &[u8], query_seed: usize, target_seed: usize, scoring: &ScoringContext, x_drop: i32) -> (usize, usize, i32) {
    let mut score = 0i32;
    let mut best = i32::MIN;
    let mut best_q = query_seed;
    let mut best_t = target_seed;
    let mut q = query_seed;
    let mut t = target_seed;

    while q < query.len() && t < target.len() {
        score += scoring.score(query[q], target[t]);
        q += 1;
        t += 1;
        if score > best {
            best = score;
            best_q = q;
            best_t = t;
        } else if best - score > x_drop {
            break;
        }
    }

    (best_q, best_t, best.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn perfect_self_hit_extends_full_length() {
        let scoring = ScoringContext::from_config(&Config::default(), "blosum62");
        let seq = b"MSTNPKPQRKTKRNTNRRPQDVKFPGG";
        let seg = extend_ungapped(seq, seq, seq.len() / 2, seq.len() / 2, &scoring, 20).unwrap();
        assert_eq!(seg.length as usize, seq.len());
        assert!(seg.score > 0);
    }

    #[test]
    fn zero_score_hit_is_discarded() {
        let scoring = ScoringContext::from_config(&Config::default(), "blosum62");
        let query = b"W";
        let target = b"D";
        let seg = extend_ungapped(query, target, 0, 0, &scoring, 20);
        assert!(seg.is_none());
    }

    #[test]
    fn single_mismatch_still_extends_around_it() {
        let scoring = ScoringContext::from_config(&Config::default(), "blosum62");
        let query = b"AAAAWAAAA";
        let target = b"AAAADAAAA";
        let seg = extend_ungapped(query, target, 4, 4, &scoring, 20).unwrap();
        assert_eq!(seg.length as usize, query.len());
    }
}
