//! Plain-text tabular formats: BLAST-6-style tabular, PAF, and SAM
//! (`SPEC_FULL.md` §6.4).

use crate::{
    model::Target,
    output::{QueryMeta, TargetMeta},
};
use std::fmt::Write as _;

/// One line per HSP, BLAST-6 column order: `qseqid sseqid pident length
/// mismatch gapopen qstart qend sstart send evalue bitscore`.
#[must_use]
pub fn render_tabular(query: &QueryMeta, targets: &[Target], target_meta: &impl Fn(u32) -> TargetMeta) -> Vec<u8> {
    let mut out = String::new();
    for target in targets {
        let meta = target_meta(target.subject_id);
        for hsp in &target.hsps {
            let _ = writeln!(
                out,
                "{}\t{}\t{:.1}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:e}\t{:.1}",
                query.name,
                meta.name,
                hsp.percent_identity(),
                hsp.length,
                hsp.mismatches,
                hsp.gap_openings,
                hsp.query_range.start + 1,
                hsp.query_range.end,
                hsp.subject_range.start + 1,
                hsp.subject_range.end,
                hsp.evalue,
                hsp.bit_score,
            );
        }
    }
    out.into_bytes()
}

/// One line per HSP in PAF (Pairwise mApping Format) convention.
#[must_use]
pub fn render_paf(query: &QueryMeta, targets: &[Target], target_meta: &impl Fn(u32) -> TargetMeta) -> Vec<u8> {
    let mut out = String::new();
    for target in targets {
        let meta = target_meta(target.subject_id);
        for hsp in &target.hsps {
            let matches = hsp.identities;
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{}\t+\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                query.name,
                query.query_len,
                hsp.query_range.start,
                hsp.query_range.end,
                meta.name,
                meta.length,
                hsp.subject_range.start,
                hsp.subject_range.end,
                matches,
                hsp.length,
                hsp.bit_score.round() as i64,
            );
        }
    }
    out.into_bytes()
}

/// One SAM record per HSP; unmapped queries are not emitted (§4.5: a query
/// with no qualifying HSPs contributes nothing to the output).
#[must_use]
pub fn render_sam(query: &QueryMeta, targets: &[Target], target_meta: &impl Fn(u32) -> TargetMeta) -> Vec<u8> {
    let mut out = String::new();
    for target in targets {
        let meta = target_meta(target.subject_id);
        for hsp in &target.hsps {
            let _ = writeln!(
                out,
                "{}\t0\t{}\t{}\t255\t{}\t*\t0\t0\t*\t*\tAS:i:{}\tNM:i:{}",
                query.name,
                meta.name,
                hsp.subject_range.start + 1,
                hsp.transcript.to_cigar(),
                hsp.score,
                hsp.mismatches,
            );
        }
    }
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::Hsp, transcript::Transcript};

    fn sample_target() -> Target {
        let mut t = Target::new(7, 0..1);
        t.hsps.push(Hsp {
            frame: 0,
            score: 42,
            evalue: 1e-10,
            bit_score: 30.0,
            query_range: 0..10,
            subject_range: 0..10,
            query_source_range: 0..10,
            transcript: Transcript::default(),
            identities: 9,
            mismatches: 1,
            gap_openings: 0,
            positives: 9,
            length: 10,
        });
        t
    }

    #[test]
    fn tabular_emits_one_line_per_hsp() {
        let query = QueryMeta {
            query_id:  0,
            name:      "q1".into(),
            query_len: 10,
        };
        let meta = |_: u32| TargetMeta {
            subject_id: 7,
            name:       "sbjct1".into(),
            length:     10,
        };
        let bytes = render_tabular(&query, &[sample_target()], &meta);
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("q1"));
        assert!(text.contains("sbjct1"));
    }
}
