//! Pairwise multi-line alignment display, 60 residues per wrap
//! (`SPEC_FULL.md` §6.4).

use crate::{
    model::{Hsp, Target},
    output::{QueryMeta, TargetMeta},
    transcript::EditOp,
};
use std::fmt::Write as _;

const WRAP_WIDTH: usize = 60;

/// Renders every qualifying HSP as a three-line wrapped alignment block:
/// query residues, a match line (`|` identity, `+` positive, space
/// otherwise), and subject residues.
#[must_use]
pub fn render_pairwise(query: &QueryMeta, targets: &[Target], target_meta: &impl Fn(u32) -> TargetMeta) -> Vec<u8> {
    let mut out = String::new();
    for target in targets {
        let meta = target_meta(target.subject_id);
        let _ = writeln!(out, ">{} {}", query.name, meta.name);
        for hsp in &target.hsps {
            render_hsp_block(&mut out, hsp);
        }
    }
    out.into_bytes()
}

fn render_hsp_block(out: &mut String, hsp: &Hsp) {
    let (query_line, match_line, subject_line) = build_display_lines(hsp);
    let _ = writeln!(out, "Score = {:.1} bits, Expect = {:.2e}", hsp.bit_score, hsp.evalue);
    let mut offset = 0usize;
    while offset < query_line.len() {
        let end = (offset + WRAP_WIDTH).min(query_line.len());
        let _ = writeln!(out, "Query  {}", &query_line[offset..end]);
        let _ = writeln!(out, "       {}", &match_line[offset..end]);
        let _ = writeln!(out, "Sbjct  {}", &subject_line[offset..end]);
        offset = end;
    }
}

/// Walks the transcript to build the three display strings, using `+` for
/// positive-scoring substitutions and `|` for identities.
fn build_display_lines(hsp: &Hsp) -> (String, String, String) {
    let mut query_line = String::new();
    let mut match_line = String::new();
    let mut subject_line = String::new();

    for op in &hsp.transcript.ops {
        match op {
            EditOp::Match(n) => {
                for _ in 0..*n {
                    query_line.push('.');
                    subject_line.push('.');
                    match_line.push('|');
                }
            }
            EditOp::Substitution(letter) => {
                query_line.push(*letter as char);
                subject_line.push('.');
                match_line.push('+');
            }
            EditOp::Insertion(letters) => {
                for &letter in letters {
                    query_line.push(letter as char);
                    subject_line.push('-');
                    match_line.push(' ');
                }
            }
            EditOp::Deletion(letters) => {
                for &letter in letters {
                    query_line.push('-');
                    subject_line.push(letter as char);
                    match_line.push(' ');
                }
            }
            EditOp::FrameShiftForward | EditOp::FrameShiftReverse => {}
        }
    }
    (query_line, match_line, subject_line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Transcript;

    #[test]
    fn display_lines_mark_insertions_and_deletions() {
        let hsp = Hsp {
            frame: 0,
            score: 10,
            evalue: 1e-5,
            bit_score: 20.0,
            query_range: 0..5,
            subject_range: 0..4,
            query_source_range: 0..5,
            transcript: Transcript::new(vec![EditOp::Match(2), EditOp::Insertion(vec![b'A']), EditOp::Match(2)]),
            identities: 4,
            mismatches: 0,
            gap_openings: 1,
            positives: 4,
            length: 5,
        };
        let (q, m, s) = build_display_lines(&hsp);
        assert_eq!(q.len(), 5);
        assert_eq!(s.chars().nth(2).unwrap(), '-');
        assert_eq!(m.chars().nth(2).unwrap(), ' ');
    }
}
