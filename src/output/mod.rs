//! Output formats and the per-query assembler contract (`SPEC_FULL.md` §4.5,
//! §6.4).

pub mod daa;
pub mod intermediate;
pub mod pairwise;
pub mod structured;
pub mod text;

use crate::{config::Config, model::Target};

/// The output format selected by `--outfmt` (§6.5). `Intermediate` is never
/// user-selectable; it is the blocked-mode internal representation (§4.5,
/// §6.4, §6.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Tabular,
    Paf,
    Sam,
    Pairwise,
    Xml,
    Json,
    Daa,
    Intermediate,
}

/// One query's display name and length, needed by formatters alongside the
/// per-HSP fields already on [`crate::model::Hsp`].
#[derive(Debug, Clone)]
pub struct QueryMeta {
    pub query_id:  u32,
    pub name:      String,
    pub query_len: u32,
}

/// A target's display name and length, supplied by the database collaborator
/// (§6.3).
#[derive(Debug, Clone)]
pub struct TargetMeta {
    pub subject_id: u32,
    pub name:       String,
    pub length:     u64,
}

/// Builds one query's rendered text/binary record after all filters (§4.5:
/// identity, query-cover, subject-cover, max-HSPs-per-target) are applied
/// here rather than earlier in the pipeline. Returns an empty buffer — never
/// a partial one — if the query has no qualifying targets (§7 "no partial
/// per-query record is ever emitted"). `query_sequence` is only consulted
/// under `OutputFormat::Daa`, which packs the raw sequence into its record
/// (§6.4); `Intermediate` is never produced here — blocked mode writes it
/// directly via [`intermediate::write_record`].
#[must_use]
pub fn assemble_query_record(
    format: OutputFormat, query: &QueryMeta, query_sequence: &[u8], targets: &[Target], target_meta: &impl Fn(u32) -> TargetMeta, config: &Config,
) -> Vec<u8> {
    let filtered = filter_targets_for_output(query, targets, config, target_meta);
    match format {
        OutputFormat::Tabular => text::render_tabular(query, &filtered, target_meta),
        OutputFormat::Paf => text::render_paf(query, &filtered, target_meta),
        OutputFormat::Sam => text::render_sam(query, &filtered, target_meta),
        OutputFormat::Pairwise => pairwise::render_pairwise(query, &filtered, target_meta),
        OutputFormat::Xml => structured::render_xml(query, &filtered, target_meta),
        OutputFormat::Json => structured::render_json(query, &filtered, target_meta),
        OutputFormat::Daa => daa::encode_query_record(query, query_sequence, &filtered, &|subject_id| subject_id),
        OutputFormat::Intermediate => Vec::new(), // written via `intermediate::write_record`, not this path
    }
}

/// Applies the §4.5 per-HSP output filters (identity/query-cover/
/// subject-cover/max-HSPs-per-target), returning a pruned copy of `targets`
/// with only qualifying HSPs retained and targets with none dropped.
fn filter_targets_for_output(query: &QueryMeta, targets: &[Target], config: &Config, target_meta: &impl Fn(u32) -> TargetMeta) -> Vec<Target> {
    targets
        .iter()
        .filter_map(|target| {
            let subject_len = target_meta(target.subject_id).length;
            let mut hsps: Vec<_> = target
                .hsps
                .iter()
                .filter(|hsp| {
                    config.min_id.is_none_or(|min| hsp.percent_identity() >= min)
                        && config.query_cover.is_none_or(|min| hsp.query_cover_percent(query.query_len) >= min)
                        && config.min_bit_score.is_none_or(|min| hsp.bit_score >= min)
                        && config.subject_cover.is_none_or(|min| hsp.subject_cover_percent(subject_len) >= min)
                })
                .cloned()
                .collect();
            if let Some(max) = config.max_hsps_per_target {
                hsps.truncate(max);
            }
            if hsps.is_empty() {
                None
            } else {
                let mut t = target.clone();
                t.hsps = hsps;
                Some(t)
            }
        })
        .collect()
}
