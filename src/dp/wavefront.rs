//! Wavefront diff alignment (`SPEC_FULL.md` §4.2, optional kernel).
//!
//! Iterates over alignment *scores* rather than matrix cells: wavefront `d`
//! holds, for every diagonal reachable at cost `d`, the furthest-advanced
//! query position reachable there. Each wavefront first greedily extends
//! along matching letters, then the next wavefront is derived from the
//! previous one. This is the classic O(ND) unit-cost form (Myers 1986); the
//! spec's "memory-low"/"memory-medium" back-trace compaction modes are not
//! implemented — the full per-wavefront history is kept, which is adequate
//! for the query/target sizes this core handles (see `DESIGN.md`).

use crate::transcript::{EditOp, Transcript};

/// Computes the unit-cost edit distance and a transcript between `a` and
/// `b`, or `None` if the distance exceeds `max_distance`.
#[must_use]
pub fn wavefront_diff(a: &[u8], b: &[u8], max_distance: u32) -> Option<(u32, Transcript)> {
    let n = a.len() as i64;
    let m = b.len() as i64;
    let max_d = i64::from(max_distance).max((n + m).min(i64::from(max_distance) + 1));

    // history[d] maps offset (k + max_d) -> furthest x reached on diagonal k.
    let mut history: Vec<Vec<i64>> = Vec::new();
    let width = (2 * max_d + 1) as usize;
    let mut v = vec![-1i64; width];
    v[(max_d) as usize] = 0;

    for d in 0..=max_d {
        for k in (-d..=d).step_by(2) {
            let idx = (k + max_d) as usize;
            let mut x = if k == -d {
                v[idx + 1]
            } else if k == d {
                v[idx - 1] + 1
            } else if v[idx - 1] + 1 > v[idx + 1] {
                v[idx - 1] + 1
            } else {
                v[idx + 1]
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n && y >= m {
                history.push(v.clone());
                return Some((d as u32, reconstruct(&history, a, b, max_d)));
            }
        }
        history.push(v.clone());
    }
    None
}

fn reconstruct(history: &[Vec<i64>], a: &[u8], b: &[u8], max_d: i64) -> Transcript {
    let n = a.len() as i64;
    let m = b.len() as i64;
    let mut ops: Vec<EditOp> = Vec::new();
    let mut x = n;
    let mut y = m;
    let mut d = history.len() as i64 - 1;

    while d > 0 || x > 0 || y > 0 {
        if d == 0 {
            break;
        }
        let k = x - y;
        let prev = &history[(d - 1) as usize];
        let idx = (k + max_d) as usize;
        let came_from_down = k == -d || (k != d && prev[idx.saturating_sub(1)] + 1 > prev[(idx + 1).min(prev.len() - 1)]);
        let prev_k = if came_from_down { k + 1 } else { k - 1 };
        let prev_idx = (prev_k + max_d) as usize;
        let prev_x = prev[prev_idx];
        let prev_y = prev_x - prev_k;

        // Snake: matches walked backward from (x, y) to (prev_x', prev_y')
        let (step_x, step_y) = if came_from_down { (prev_x, prev_y + 1) } else { (prev_x + 1, prev_y) };

        let mut run = 0u32;
        while x > step_x && y > step_y {
            x -= 1;
            y -= 1;
            run += 1;
        }
        if run > 0 {
            ops.push(EditOp::Match(run));
        }

        if came_from_down {
            // Deletion: consumed a `b` letter without advancing `a`.
            y -= 1;
            ops.push(EditOp::Deletion(vec![b[y as usize]]));
        } else {
            x -= 1;
            ops.push(EditOp::Insertion(vec![a[x as usize]]));
        }
        d -= 1;
    }
    let mut leading_match = 0u32;
    while x > 0 && y > 0 && a[x as usize - 1] == b[y as usize - 1] {
        x -= 1;
        y -= 1;
        leading_match += 1;
    }
    if leading_match > 0 {
        ops.push(EditOp::Match(leading_match));
    }
    ops.reverse();
    Transcript::new(merge_runs(ops))
}

fn merge_runs(ops: Vec<EditOp>) -> Vec<EditOp> {
    let mut out: Vec<EditOp> = Vec::with_capacity(ops.len());
    for op in ops {
        match (out.last_mut(), &op) {
            (Some(EditOp::Insertion(prev)), EditOp::Insertion(letters)) => prev.extend(letters),
            (Some(EditOp::Deletion(prev)), EditOp::Deletion(letters)) => prev.extend(letters),
            (Some(EditOp::Match(prev)), EditOp::Match(n)) => *prev += n,
            _ => out.push(op),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_sequences_have_zero_distance() {
        let (distance, transcript) = wavefront_diff(b"ACGTACGT", b"ACGTACGT", 4).unwrap();
        assert_eq!(distance, 0);
        assert_eq!(transcript.to_cigar(), "8M");
    }

    #[test]
    fn single_insertion_detected() {
        let (distance, _transcript) = wavefront_diff(b"ACGTACGT", b"ACGTTACGT", 4).unwrap();
        assert_eq!(distance, 1);
    }

    #[test]
    fn exceeding_max_distance_returns_none() {
        assert!(wavefront_diff(b"AAAA", b"TTTT", 1).is_none());
    }
}
