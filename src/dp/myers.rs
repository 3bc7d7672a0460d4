//! Myers bit-parallel edit distance (`SPEC_FULL.md` §4.2).
//!
//! Implements the `Pv, Mv` word-at-a-time recurrence (Myers 1999) for
//! patterns up to 64 letters; longer patterns are processed in 64-letter
//! blocks carrying the horizontal delta between blocks (`PHin`/`MHin`).
//! Cutoff pruning abandons the computation once the bottom row's distance
//! provably exceeds `max_distance`.

/// The outcome of a bounded edit-distance computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditDistanceResult {
    pub distance: u32,
}

/// Builds, for each of the 256 possible bytes, a 64-bit mask of the
/// positions in `pattern` (up to 64 letters) equal to that byte.
fn build_peq(pattern: &[u8]) -> [u64; 256] {
    let mut peq = [0u64; 256];
    for (i, &b) in pattern.iter().enumerate().take(64) {
        peq[b as usize] |= 1u64 << i;
    }
    peq
}

/// Computes the unit-cost edit distance between `pattern` (≤ 64 letters) and
/// `text`, returning `None` once the distance is provably above
/// `max_distance` (cutoff pruning, §4.2). `pattern` longer than 64 letters is
/// rejected; callers chunk longer comparisons themselves.
#[must_use]
pub fn edit_distance_bounded(pattern: &[u8], text: &[u8], max_distance: u32) -> Option<EditDistanceResult> {
    if pattern.len() > 64 {
        return edit_distance_blocked(pattern, text, max_distance);
    }
    if pattern.is_empty() {
        return if text.len() as u32 <= max_distance {
            Some(EditDistanceResult { distance: text.len() as u32 })
        } else {
            None
        };
    }

    let peq = build_peq(pattern);
    let m = pattern.len() as u32;
    let top_bit = 1u64 << (pattern.len() - 1);
    let mut pv: u64 = if pattern.len() == 64 { u64::MAX } else { (1u64 << pattern.len()) - 1 };
    let mut mv: u64 = 0;
    let mut score = m;

    for &c in text {
        let eq = peq[c as usize];
        let xv = eq | mv;
        let xh = (((eq & pv).wrapping_add(pv)) ^ pv) | eq;
        let mut ph = mv | !(xh | pv);
        let mut mh = pv & xh;

        if ph & top_bit != 0 {
            score += 1;
        } else if mh & top_bit != 0 {
            score -= 1;
        }

        ph = (ph << 1) | 1;
        mh <<= 1;
        pv = mh | !(xv | ph);
        mv = ph & xv;

        if score > max_distance + m {
            // Even a perfect remaining match of the rest of the pattern
            // could not bring the distance back under the cutoff.
            return None;
        }
    }

    if score <= max_distance {
        Some(EditDistanceResult { distance: score })
    } else {
        None
    }
}

/// Processes `pattern` longer than one machine word in 64-letter blocks,
/// propagating the horizontal carry (`PHin`/`MHin`) between blocks.
fn edit_distance_blocked(pattern: &[u8], text: &[u8], max_distance: u32) -> Option<EditDistanceResult> {
    let blocks: Vec<&[u8]> = pattern.chunks(64).collect();
    let mut block_state: Vec<(u64, u64, u32)> = blocks
        .iter()
        .map(|b| {
            let width = b.len();
            let pv = if width == 64 { u64::MAX } else { (1u64 << width) - 1 };
            (pv, 0u64, width as u32)
        })
        .collect();
    let peqs: Vec<[u64; 256]> = blocks.iter().map(|b| build_peq(b)).collect();
    let mut total_score: u32 = pattern.len() as u32;

    for &c in text {
        let mut carry_ph: i32 = 1;
        let mut carry_mh: i32 = 0;
        let mut block_score_delta: i32 = 0;

        for (idx, (pv, mv, width)) in block_state.iter_mut().enumerate() {
            let top_bit = 1u64 << (*width - 1);
            let eq = peqs[idx][c as usize] | (carry_mh as u64);
            let xv = eq | *mv;
            let pv_in = *pv | (carry_ph as u64 & 1);
            let xh = (((eq & pv_in).wrapping_add(pv_in)) ^ pv_in) | eq;
            let mut ph = *mv | !(xh | pv_in);
            let mut mh = pv_in & xh;

            if ph & top_bit != 0 {
                block_score_delta += 1;
            } else if mh & top_bit != 0 {
                block_score_delta -= 1;
            }

            carry_ph = i32::from(ph & top_bit != 0);
            carry_mh = i32::from(mh & top_bit != 0);

            ph = (ph << 1) | 1;
            mh <<= 1;
            *pv = mh | !(xv | ph);
            *mv = ph & xv;
        }

        total_score = (total_score as i32 + block_score_delta).max(0) as u32;
        if total_score > max_distance + pattern.len() as u32 {
            return None;
        }
    }

    if total_score <= max_distance {
        Some(EditDistanceResult { distance: total_score })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_have_zero_distance() {
        let result = edit_distance_bounded(b"ACGTACGT", b"ACGTACGT", 4).unwrap();
        assert_eq!(result.distance, 0);
    }

    #[test]
    fn single_substitution_has_distance_one() {
        let result = edit_distance_bounded(b"ACGTACGT", b"ACGAACGT", 4).unwrap();
        assert_eq!(result.distance, 1);
    }

    #[test]
    fn exceeding_cutoff_returns_none() {
        let result = edit_distance_bounded(b"AAAAAAAA", b"TTTTTTTT", 2);
        assert!(result.is_none());
    }

    #[test]
    fn long_pattern_uses_blocked_path() {
        let pattern = vec![b'A'; 130];
        let mut text = pattern.clone();
        text[64] = b'T';
        let result = edit_distance_bounded(&pattern, &text, 4).unwrap();
        assert_eq!(result.distance, 1);
    }
}
