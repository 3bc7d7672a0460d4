//! Ties the hit grouper, pipeline, and output assembler together into the
//! per-worker unit of work (`SPEC_FULL.md` §5): one query per iteration,
//! end-to-end, submitted to the ordering queue so query-submission order is
//! preserved in the output regardless of completion order.

use crate::{
    config::Config,
    database::TargetDatabase,
    hit_grouper::{group_hits, ResolvedHit},
    model::QueryContext,
    output::{assemble_query_record, intermediate, QueryMeta},
    pipeline::run_pipeline,
    queue::OrderingQueue,
    scoring::ScoringContext,
    stats::Stats,
};

/// One query's work: its translated frames/bias and the raw seed hits
/// resolved to subject ids, already sliced out of the flat §6.1 input stream.
pub struct QueryJob {
    pub query: QueryContext,
    pub name:  String,
    pub hits:  Vec<ResolvedHit>,
}

/// Runs the full hit-grouping → pipeline → output-assembly chain for one
/// query, returning its rendered record (possibly empty, §7).
#[must_use]
pub fn process_query(job: QueryJob, db: &impl TargetDatabase, scoring: &ScoringContext, config: &Config, stats: &Stats) -> Vec<u8> {
    let QueryJob { query, name, mut hits } = job;
    let query_seq = query.frames.first().cloned().unwrap_or_default();

    let targets = group_hits(&mut hits, &query_seq, &|id| db.sequence(id).to_vec(), scoring, config.x_drop);
    let targets = run_pipeline(config.pipeline, &query, targets, &hits, &|id| db.sequence(id).to_vec(), scoring, config, stats);

    let meta = QueryMeta {
        query_id: query.query_id,
        name,
        query_len: query.representative_len() as u32,
    };
    let record = assemble_query_record(config.output_format, &meta, &query_seq, &targets, &|id| db.meta(id), config);
    stats.record_query_processed();
    stats.record_hsps_reported(targets.iter().map(|t| t.hsps.len() as u64).sum());
    record
}

/// The blocked-mode counterpart of [`process_query`]: runs the same
/// hit-grouping → pipeline chain against one reference chunk, but encodes
/// raw per-HSP intermediate records (§6.6) instead of a rendered output
/// record, since the §4.5 output filters and global culling only make sense
/// once every chunk's records for a query have been merged
/// ([`crate::output::intermediate::merge_chunks`]).
#[must_use]
pub fn process_query_intermediate(job: QueryJob, db: &impl TargetDatabase, scoring: &ScoringContext, config: &Config, stats: &Stats) -> Vec<u8> {
    let QueryJob { query, name: _, mut hits } = job;
    let query_seq = query.frames.first().cloned().unwrap_or_default();

    let targets = group_hits(&mut hits, &query_seq, &|id| db.sequence(id).to_vec(), scoring, config.x_drop);
    let targets = run_pipeline(config.pipeline, &query, targets, &hits, &|id| db.sequence(id).to_vec(), scoring, config, stats);

    stats.record_hsps_reported(targets.iter().map(|t| t.hsps.len() as u64).sum());
    intermediate::encode_query_intermediate(&targets, &|id| id)
}

/// Drives every job in `jobs` through `process`, using a `rayon` worker pool
/// sized to `config.threads` (mirroring the teacher's
/// `rayon::ThreadPoolBuilder`/`par_bridge` usage) and an [`OrderingQueue`] to
/// restore submission order before handing each record to `sink`. `sink`
/// runs inline on whichever worker thread currently holds the queue head
/// (§5: "no dedicated writer thread").
///
/// Slots are reserved strictly in `jobs`' iteration order on the calling
/// thread — cheap, since `init` only assigns `()` — before each job's actual
/// DP work is dispatched into the pool; that ordering-before-dispatch split
/// is what lets `process` run out of order across threads while still
/// restoring submission order at `sink`. [`run_workers`] and
/// [`run_workers_intermediate`] are thin wrappers around this, selecting
/// [`process_query`] or [`process_query_intermediate`] respectively.
#[cfg(not(feature = "dev_no_rayon"))]
fn run_workers_with<D: TargetDatabase + Sync>(
    jobs: Vec<QueryJob>, db: &D, scoring: &ScoringContext, config: &Config, stats: &Stats,
    process: impl Fn(QueryJob, &D, &ScoringContext, &Config, &Stats) -> Vec<u8> + Sync, sink: impl Fn(Vec<u8>) + Sync,
) {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .expect("thread pool construction should not fail for a positive thread count");

    let queue: OrderingQueue<(), Vec<u8>, _> = OrderingQueue::new(config.threads.max(1) * 4, sink);

    pool.scope(|scope| {
        for job in jobs {
            let Some((_, slot_id)) = queue.get(|| Some(())) else { break };
            let queue = &queue;
            let process = &process;
            scope.spawn(move |_| {
                let record = process(job, db, scoring, config, stats);
                queue.push(slot_id, record);
            });
        }
    });
}

#[cfg(not(feature = "dev_no_rayon"))]
pub fn run_workers(jobs: Vec<QueryJob>, db: &(impl TargetDatabase + Sync), scoring: &ScoringContext, config: &Config, stats: &Stats, sink: impl Fn(Vec<u8>) + Sync) {
    run_workers_with(jobs, db, scoring, config, stats, process_query, sink);
}

/// Blocked-mode variant of [`run_workers`], encoding raw intermediate
/// records per chunk via [`process_query_intermediate`] instead of rendered
/// output records.
#[cfg(not(feature = "dev_no_rayon"))]
pub fn run_workers_intermediate(jobs: Vec<QueryJob>, db: &(impl TargetDatabase + Sync), scoring: &ScoringContext, config: &Config, stats: &Stats, sink: impl Fn(Vec<u8>) + Sync) {
    run_workers_with(jobs, db, scoring, config, stats, process_query_intermediate, sink);
}

/// Single-threaded fallback used for deterministic debugging of
/// ordering-queue behavior (mirrors the teacher's `dev_no_rayon` split in
/// `aligner::writers`); submission order and output order are trivially the
/// same thing here.
#[cfg(feature = "dev_no_rayon")]
pub fn run_workers(jobs: Vec<QueryJob>, db: &(impl TargetDatabase + Sync), scoring: &ScoringContext, config: &Config, stats: &Stats, sink: impl Fn(Vec<u8>) + Sync) {
    for job in jobs {
        let record = process_query(job, db, scoring, config, stats);
        sink(record);
    }
}

#[cfg(feature = "dev_no_rayon")]
pub fn run_workers_intermediate(jobs: Vec<QueryJob>, db: &(impl TargetDatabase + Sync), scoring: &ScoringContext, config: &Config, stats: &Stats, sink: impl Fn(Vec<u8>) + Sync) {
    for job in jobs {
        let record = process_query_intermediate(job, db, scoring, config, stats);
        sink(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryDatabase;
    use std::sync::{Arc, Mutex};

    #[test]
    fn process_query_yields_nonempty_record_for_self_hit() {
        let seq = b"MKTAYIAKQRQISFVKSHFSRQLEERLGLIEVQAPILSRVGDGTQDNLSGAEKAVQVKVKALPDAQFEVVHSLAKWKRQTLGQHDFSAGEGLYTHMKALRPDEDRL".to_vec();
        let db = InMemoryDatabase::from_records(vec![("target".into(), seq.clone())]);

        let job = QueryJob {
            query: QueryContext::new(0, vec![seq.clone()]),
            name:  "query1".into(),
            hits:  vec![ResolvedHit {
                subject_id:      0,
                query_position:  0,
                target_position: 0,
            }],
        };
        let scoring = ScoringContext::from_config(&Config::default(), "blosum62");
        let config = Config::default();
        let stats = Stats::default();

        let record = process_query(job, &db, &scoring, &config, &stats);
        assert!(!record.is_empty());
    }

    #[test]
    fn process_query_intermediate_yields_one_record_per_hsp() {
        let seq = b"MKTAYIAKQRQISFVKSHFSRQLEERLGLIEVQAPILSRVGDGTQDNLSGAEKAVQVKVKALPDAQFEVVHSLAKWKRQTLGQHDFSAGEGLYTHMKALRPDEDRL".to_vec();
        let db = InMemoryDatabase::from_records(vec![("target".into(), seq.clone())]);

        let job = QueryJob {
            query: QueryContext::new(0, vec![seq.clone()]),
            name:  "query1".into(),
            hits:  vec![ResolvedHit {
                subject_id:      0,
                query_position:  0,
                target_position: 0,
            }],
        };
        let scoring = ScoringContext::from_config(&Config::default(), "blosum62");
        let config = Config::default();
        let stats = Stats::default();

        let record = process_query_intermediate(job, &db, &scoring, &config, &stats);
        let mut i = 0;
        let decoded = crate::output::intermediate::read_query_records(&record, &mut i).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].target_dict_id, 0);
    }

    #[test]
    fn run_workers_preserves_submission_order_in_sink() {
        let seq = b"MKTAYIAKQRQISFVKSHFSRQLEERLGLIEVQAPILSRVGDGTQDNLSGAEKAVQVKVKALPDAQFEVVHSLAKWKRQTLGQHDFSAGEGLYTHMKALRPDEDRL".to_vec();
        let db = InMemoryDatabase::from_records(vec![("target".into(), seq.clone())]);
        let scoring = ScoringContext::from_config(&Config::default(), "blosum62");
        let mut config = Config::default();
        config.threads = 4;
        let stats = Stats::default();

        let jobs: Vec<QueryJob> = (0..20)
            .map(|i| QueryJob {
                query: QueryContext::new(i, vec![seq.clone()]),
                name:  format!("q{i}"),
                hits:  vec![ResolvedHit {
                    subject_id:      0,
                    query_position:  0,
                    target_position: 0,
                }],
            })
            .collect();

        let sink_out = Arc::new(Mutex::new(Vec::new()));
        let sink_clone = Arc::clone(&sink_out);
        run_workers(jobs, &db, &scoring, &config, &stats, move |record| {
            sink_clone.lock().unwrap().push(record);
        });

        assert_eq!(sink_out.lock().unwrap().len(), 20);
    }
}
