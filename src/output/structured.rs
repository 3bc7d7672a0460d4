//! Structured nested per-query → per-target → per-HSP output, JSON and XML
//! (`SPEC_FULL.md` §6.4). Hand-rolled rather than pulled in via a
//! serialization crate: the teacher carries no `serde` dependency, and the
//! nesting here is simple and fixed enough not to need one (see `DESIGN.md`).

use crate::{
    model::Target,
    output::{QueryMeta, TargetMeta},
};
use std::fmt::Write as _;

/// Escapes a string for embedding in a JSON string literal.
fn json_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes a string for embedding in XML character data.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[must_use]
pub fn render_json(query: &QueryMeta, targets: &[Target], target_meta: &impl Fn(u32) -> TargetMeta) -> Vec<u8> {
    let mut out = String::new();
    let _ = write!(out, r#"{{"query":"{}","hits":["#, json_escape(&query.name));
    for (ti, target) in targets.iter().enumerate() {
        if ti > 0 {
            out.push(',');
        }
        let meta = target_meta(target.subject_id);
        let _ = write!(out, r#"{{"target":"{}","hsps":["#, json_escape(&meta.name));
        for (hi, hsp) in target.hsps.iter().enumerate() {
            if hi > 0 {
                out.push(',');
            }
            let _ = write!(
                out,
                r#"{{"score":{},"evalue":{:e},"bit_score":{:.2},"identity":{:.2},"query_from":{},"query_to":{},"hit_from":{},"hit_to":{},"identities":{},"positives":{},"gaps":{},"length":{}}}"#,
                hsp.score,
                hsp.evalue,
                hsp.bit_score,
                hsp.percent_identity(),
                hsp.query_range.start + 1,
                hsp.query_range.end,
                hsp.subject_range.start + 1,
                hsp.subject_range.end,
                hsp.identities,
                hsp.positives,
                hsp.gap_openings,
                hsp.length,
            );
        }
        out.push_str("]}");
    }
    out.push_str("]}");
    out.into_bytes()
}

#[must_use]
pub fn render_xml(query: &QueryMeta, targets: &[Target], target_meta: &impl Fn(u32) -> TargetMeta) -> Vec<u8> {
    let mut out = String::new();
    let _ = writeln!(out, r#"<query id="{}" name="{}">"#, query.query_id, xml_escape(&query.name));
    for target in targets {
        let meta = target_meta(target.subject_id);
        let _ = writeln!(out, r#"  <hit name="{}" length="{}">"#, xml_escape(&meta.name), meta.length);
        for hsp in &target.hsps {
            let _ = writeln!(
                out,
                r#"    <hsp score="{}" evalue="{:e}" bit-score="{:.2}" identity="{:.2}" query-from="{}" query-to="{}" hit-from="{}" hit-to="{}"/>"#,
                hsp.score,
                hsp.evalue,
                hsp.bit_score,
                hsp.percent_identity(),
                hsp.query_range.start + 1,
                hsp.query_range.end,
                hsp.subject_range.start + 1,
                hsp.subject_range.end,
            );
        }
        out.push_str("  </hit>\n");
    }
    out.push_str("</query>\n");
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::Hsp, transcript::Transcript};

    fn sample() -> (QueryMeta, Vec<Target>) {
        let mut t = Target::new(3, 0..1);
        t.hsps.push(Hsp {
            frame: 0,
            score: 55,
            evalue: 1e-12,
            bit_score: 40.0,
            query_range: 0..20,
            subject_range: 0..20,
            query_source_range: 0..20,
            transcript: Transcript::default(),
            identities: 18,
            mismatches: 2,
            gap_openings: 0,
            positives: 19,
            length: 20,
        });
        (
            QueryMeta {
                query_id:  1,
                name:      "q".into(),
                query_len: 20,
            },
            vec![t],
        )
    }

    #[test]
    fn json_output_is_well_bracketed() {
        let (query, targets) = sample();
        let meta = |_: u32| TargetMeta {
            subject_id: 3,
            name:       "s".into(),
            length:     20,
        };
        let bytes = render_json(&query, &targets, &meta);
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.matches('{').count(), text.matches('}').count());
        assert_eq!(text.matches('[').count(), text.matches(']').count());
    }

    #[test]
    fn xml_output_closes_every_tag() {
        let (query, targets) = sample();
        let meta = |_: u32| TargetMeta {
            subject_id: 3,
            name:       "s".into(),
            length:     20,
        };
        let bytes = render_xml(&query, &targets, &meta);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("</query>"));
        assert!(text.contains("</hit>"));
    }
}
