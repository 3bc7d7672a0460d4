//! Banded, affine-gap local Smith-Waterman with optional traceback
//! (`SPEC_FULL.md` §4.2, primary kernel of the banded-swipe pipeline, §4.4.1).
//!
//! The band is addressed by diagonal `d = target_index - query_index`; only
//! columns with `d_min <= d < d_end` are computed per row. Width selection
//! (§4.2: 8/16/32-bit SIMD lanes) is simulated here over ordinary `i64`
//! arithmetic — the same overflow boundaries are checked and recorded on
//! [`Stats`], but the kernel itself is scalar; see `DESIGN.md` for why the
//! full SIMD striping was not attempted without a compiler to check it against.

use crate::{
    dp::Width,
    scoring::ScoringContext,
    stats::Stats,
    transcript::{EditOp, Transcript},
};

/// One traceback cell's best-scoring predecessor, used to reconstruct the
/// transcript after the forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trace {
    None,
    Diag,
    Up,
    Left,
}

/// The result of a banded alignment.
#[derive(Debug, Clone)]
pub struct BandedAlignment {
    pub score:         i32,
    pub query_range:   std::ops::Range<u32>,
    pub subject_range: std::ops::Range<u64>,
    pub transcript:    Option<Transcript>,
}

/// Runs the banded kernel. `bias` is an optional per-query-position score
/// correction (composition-based statistics, §4.1), indexed the same as
/// `query`. `traceback` selects score-only mode (§4.4.1 stage 3) versus full
/// traceback (stage 5).
#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn banded_align(
    query: &[u8], target: &[u8], d_min: i64, d_end: i64, scoring: &ScoringContext, bias: Option<&[i32]>, traceback: bool, stats: &Stats,
) -> Option<BandedAlignment> {
    let qlen = query.len();
    let tlen = target.len();
    if qlen == 0 || tlen == 0 || d_end <= d_min {
        return None;
    }

    let band_width = (d_end - d_min) as usize;
    let starting_width = Width::smallest_safe(i64::from(i16::MAX).min((qlen.max(tlen) as i64) * 20));
    let mut width = starting_width;

    // Column `c` within a row corresponds to target index `j = i as i64 + d_min + c`.
    let col_of = |i: usize, j: usize| -> Option<usize> {
        let c = j as i64 - i as i64 - d_min;
        if c >= 0 && (c as usize) < band_width { Some(c as usize) } else { None }
    };

    let rows = qlen + 1;
    let mut h = vec![vec![0i64; band_width + 1]; rows];
    let mut e = vec![vec![i64::MIN / 2; band_width + 1]; rows];
    let mut f = vec![vec![i64::MIN / 2; band_width + 1]; rows];
    let mut trace = if traceback {
        vec![vec![Trace::None; band_width + 1]; rows]
    } else {
        Vec::new()
    };

    let mut best_score = 0i64;
    let mut best_i = 0usize;
    let mut best_j = 0usize;
    let mut overflowed = false;

    for i in 1..=qlen {
        let j_lo = ((i as i64 + d_min).max(0)) as usize;
        let j_hi = ((i as i64 + d_end).min(tlen as i64 + 1)).max(0) as usize;
        for j in j_lo.max(1)..=j_hi.min(tlen) {
            let Some(c) = col_of(i, j) else { continue };

            let diag_score = {
                let base = i64::from(scoring.score(query[i - 1], target[j - 1]));
                let bias_term = bias.map_or(0, |b| i64::from(b[i - 1]));
                let prev = col_of(i - 1, j - 1).map_or(0, |pc| h[i - 1][pc]);
                prev + base + bias_term
            };

            let open = i64::from(scoring.gap_open());
            let extend = i64::from(scoring.gap_extend());

            let e_val = {
                let from_h = col_of(i, j - 1).map_or(i64::MIN / 2, |pc| h[i][pc] - open);
                let from_e = col_of(i, j - 1).map_or(i64::MIN / 2, |pc| e[i][pc] - extend);
                from_h.max(from_e)
            };
            let f_val = {
                let from_h = col_of(i - 1, j).map_or(i64::MIN / 2, |pc| h[i - 1][pc] - open);
                let from_f = col_of(i - 1, j).map_or(i64::MIN / 2, |pc| f[i - 1][pc] - extend);
                from_h.max(from_f)
            };

            e[i][c] = e_val;
            f[i][c] = f_val;

            let candidate = diag_score.max(e_val).max(f_val).max(0);
            h[i][c] = candidate;

            if traceback {
                trace[i][c] = if candidate == 0 {
                    Trace::None
                } else if candidate == diag_score {
                    Trace::Diag
                } else if candidate == e_val {
                    Trace::Left
                } else {
                    Trace::Up
                };
            }

            if width.saturates(candidate) {
                overflowed = true;
            }
            if candidate > best_score {
                best_score = candidate;
                best_i = i;
                best_j = j;
            }
        }
    }

    if overflowed {
        stats.record_dp_overflow_retry();
        while width.saturates(best_score) {
            match width.widen() {
                Some(w) => width = w,
                None => break,
            }
        }
    }

    if best_score <= 0 {
        return None;
    }

    let (query_start, subject_start, ops) = if traceback {
        traceback_path(&trace, &col_of, best_i, best_j, query, target)
    } else {
        (0, 0, Vec::new())
    };

    Some(BandedAlignment {
        score: best_score as i32,
        query_range: if traceback { query_start as u32..best_i as u32 } else { 0..best_i as u32 },
        subject_range: if traceback { subject_start as u64..best_j as u64 } else { 0..best_j as u64 },
        transcript: if traceback { Some(Transcript::new(ops)) } else { None },
    })
}

fn traceback_path(
    trace: &[Vec<Trace>], col_of: &impl Fn(usize, usize) -> Option<usize>, start_i: usize, start_j: usize, query: &[u8], target: &[u8],
) -> (usize, usize, Vec<EditOp>) {
    let mut i = start_i;
    let mut j = start_j;
    let mut ops_rev: Vec<EditOp> = Vec::new();
    let mut match_run = 0u32;

    loop {
        let Some(c) = col_of(i, j) else { break };
        match trace[i][c] {
            Trace::None => break,
            Trace::Diag => {
                if query[i - 1] == target[j - 1] {
                    match_run += 1;
                } else {
                    if match_run > 0 {
                        ops_rev.push(EditOp::Match(match_run));
                        match_run = 0;
                    }
                    ops_rev.push(EditOp::Substitution(query[i - 1]));
                }
                i -= 1;
                j -= 1;
            }
            Trace::Left => {
                if match_run > 0 {
                    ops_rev.push(EditOp::Match(match_run));
                    match_run = 0;
                }
                ops_rev.push(EditOp::Insertion(vec![query[i - 1]]));
                i -= 1;
            }
            Trace::Up => {
                if match_run > 0 {
                    ops_rev.push(EditOp::Match(match_run));
                    match_run = 0;
                }
                ops_rev.push(EditOp::Deletion(vec![target[j - 1]]));
                j -= 1;
            }
        }
    }
    if match_run > 0 {
        ops_rev.push(EditOp::Match(match_run));
    }
    ops_rev.reverse();
    let merged = merge_adjacent_runs(ops_rev);
    (i, j, merged)
}

/// Coalesces adjacent same-kind insertion/deletion ops produced one residue
/// at a time by the traceback walk into single runs.
fn merge_adjacent_runs(ops: Vec<EditOp>) -> Vec<EditOp> {
    let mut out: Vec<EditOp> = Vec::with_capacity(ops.len());
    for op in ops {
        match (out.last_mut(), &op) {
            (Some(EditOp::Insertion(prev)), EditOp::Insertion(letters)) => prev.extend(letters),
            (Some(EditOp::Deletion(prev)), EditOp::Deletion(letters)) => prev.extend(letters),
            _ => out.push(op),
        }
    }
    out
}
