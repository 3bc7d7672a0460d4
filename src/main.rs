//! The `extend` binary: reads a reference database, a query file, and a raw
//! `SeedHit` stream, and writes ranked, scored alignment records
//! (`SPEC_FULL.md` §1, §6).

use clap::Parser;
use std::{io::Write, sync::Mutex};
use tracing_subscriber::EnvFilter;
use xtend_core::{
    args::{parse_extend_args, ExtendArgs},
    config::Config,
    database::{chunk_sizes, ChunkDictionary, DatabaseSlice, InMemoryDatabase, TargetDatabase},
    error::{Error, GetCode, ResultWithPathContext},
    hit_grouper::ResolvedHit,
    io::{FastX, FastXReader, WriteFileOrStdout},
    model::{QueryContext, SeedHit},
    output::{assemble_query_record, daa, intermediate, OutputFormat, QueryMeta},
    scoring::ScoringContext,
    stats::Stats,
    worker::{run_workers, run_workers_intermediate, QueryJob},
};

/// Splits a global, database-concatenated target position into `(subject_id,
/// local_offset)` using a prefix-sum table of subject lengths. Not part of
/// the external wire format (§6.1) — a bookkeeping detail of how this binary
/// lays sequences out contiguously in memory.
fn resolve_target_position(offsets: &[u64], global_pos: u64) -> (u32, u64) {
    let subject_id = match offsets.binary_search(&global_pos) {
        Ok(i) => i,
        Err(i) => i - 1,
    };
    (subject_id as u32, global_pos - offsets[subject_id])
}

/// Processes the reference in `config.reference_chunks` contiguous chunks
/// (§4.5, §6.6). Each chunk runs the full hit-grouping → pipeline chain
/// against only its slice of the database and yields raw, unfiltered
/// intermediate records per query (`worker::run_workers_intermediate`). Once
/// every chunk has run, each query's records are joined across chunks
/// (`output::intermediate::merge_chunks`, which re-applies global culling)
/// and rendered exactly as the single-chunk path would.
///
/// Chunk records are kept in memory rather than spilled to temporary files:
/// this binary always holds the whole reference in memory already (see
/// `DESIGN.md`), so nothing is gained by round-tripping through disk here —
/// only the join-blocks merge itself (§6.6) is implemented.
fn run_blocked(jobs: &[QueryJob], db: &InMemoryDatabase, scoring: &ScoringContext, config: &Config, stats: &Stats, write: &impl Fn(&[u8])) {
    let sizes = chunk_sizes(db.len() as u32, config.reference_chunks);
    let dict = ChunkDictionary::new(&sizes);

    let mut chunk_buffers: Vec<Vec<Vec<u8>>> = Vec::with_capacity(sizes.len());
    for (chunk_idx, &size) in sizes.iter().enumerate() {
        let start = dict.global_id(chunk_idx, 0);
        let chunk_db = DatabaseSlice::new(db, start, size);
        let chunk_jobs: Vec<QueryJob> = jobs
            .iter()
            .map(|job| {
                let hits: Vec<ResolvedHit> = job
                    .hits
                    .iter()
                    .filter(|h| h.subject_id >= start && h.subject_id < start + size)
                    .map(|h| ResolvedHit {
                        subject_id: h.subject_id - start,
                        ..*h
                    })
                    .collect();
                QueryJob {
                    query: job.query.clone(),
                    name: job.name.clone(),
                    hits,
                }
            })
            .collect();

        let buf: Mutex<Vec<Vec<u8>>> = Mutex::new(Vec::with_capacity(chunk_jobs.len()));
        run_workers_intermediate(chunk_jobs, &chunk_db, scoring, config, stats, |record| {
            buf.lock().unwrap().push(record);
        });
        chunk_buffers.push(buf.into_inner().unwrap());
    }

    for (q, job) in jobs.iter().enumerate() {
        let decoded: Vec<Vec<intermediate::DecodedRecord>> = chunk_buffers
            .iter()
            .map(|chunk| {
                let mut i = 0;
                intermediate::read_query_records(&chunk[q], &mut i).unwrap_or_default()
            })
            .collect();
        let query_seq = job.query.frames.first().cloned().unwrap_or_default();
        let query_len = query_seq.len() as u64;
        let targets = intermediate::merge_chunks(
            &decoded,
            &|chunk_idx, dict_id| dict.global_id(chunk_idx, dict_id),
            config,
            &|score| scoring.bit_score(score),
            &|score, subject_len| scoring.evalue(score, query_len, subject_len),
        );

        let meta = QueryMeta {
            query_id:  job.query.query_id,
            name:      job.name.clone(),
            query_len: job.query.representative_len() as u32,
        };
        let record = assemble_query_record(config.output_format, &meta, &query_seq, &targets, &|id| db.meta(id), config);
        write(&record);
        stats.record_query_processed();
        stats.record_hsps_reported(targets.iter().map(|t| t.hsps.len() as u64).sum());
    }
}

fn run() -> Result<(), Error> {
    let args = ExtendArgs::parse();
    let filter = if args.verbose > 0 {
        EnvFilter::new(if args.verbose == 1 { "info" } else { "debug" })
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let parsed = parse_extend_args(args);

    let db = InMemoryDatabase::from_fasta_file(&parsed.database)?;
    let offsets: Vec<u64> = {
        let mut acc = 0u64;
        (0..db.len())
            .map(|i| {
                let start = acc;
                acc += db.length(i as u32);
                start
            })
            .collect()
    };

    let seeds_bytes = std::fs::read(&parsed.seeds).with_path(&parsed.seeds)?;
    let mut hits_by_query: std::collections::BTreeMap<u32, Vec<ResolvedHit>> = std::collections::BTreeMap::new();
    for chunk in seeds_bytes.chunks_exact(SeedHit::WIRE_SIZE) {
        let hit = SeedHit::from_bytes(chunk.try_into().expect("chunks_exact guarantees the right length"));
        let (subject_id, local_offset) = resolve_target_position(&offsets, hit.target_position);
        hits_by_query.entry(hit.query_id).or_default().push(ResolvedHit {
            subject_id,
            query_position: hit.seed_offset,
            target_position: local_offset,
        });
    }

    let query_reader = FastXReader::from_filename(&parsed.query).with_path(&parsed.query)?;
    let mut jobs = Vec::new();
    for (query_id, record) in query_reader.enumerate() {
        let FastX { header, sequence, .. } = record.with_path(&parsed.query)?;
        let Some(hits) = hits_by_query.remove(&(query_id as u32)) else { continue };
        jobs.push(QueryJob {
            query: QueryContext::new(query_id as u32, vec![sequence]),
            name: header,
            hits,
        });
    }

    let scoring = ScoringContext::from_config(&parsed.config, &parsed.matrix_name);
    let stats = Stats::default();
    let out = Mutex::new(WriteFileOrStdout::new_from_opt_path(parsed.output.as_ref()).with_path(parsed.output.clone().unwrap_or_default())?);
    let write_err: Mutex<Option<std::io::Error>> = Mutex::new(None);
    let write = |bytes: &[u8]| {
        if let Err(e) = out.lock().unwrap().write_all(bytes) {
            write_err.lock().unwrap().get_or_insert(e);
        }
    };

    if parsed.config.output_format == OutputFormat::Daa {
        write(&daa::write_header1());
        let db_letters = (0..db.len() as u32).map(|id| db.length(id)).sum();
        let header2 = daa::Header2 {
            build_number: 0,
            db_seqs: db.len() as u64,
            db_seqs_used: db.len() as u64,
            db_letters,
            gap_open: parsed.config.gap_open,
            gap_extend: parsed.config.gap_extend,
            lambda: scoring.karlin_altschul().lambda,
            k: scoring.karlin_altschul().k,
            evalue_cutoff: parsed.config.max_evalue,
            matrix_name: parsed.matrix_name.clone(),
            block_types: [0, 0, 0],
            block_sizes: [0, 0, 0],
        };
        write(&header2.to_bytes());
    }

    if parsed.config.reference_chunks <= 1 {
        run_workers(jobs, &db, &scoring, &parsed.config, &stats, |record| write(&record));
    } else {
        run_blocked(&jobs, &db, &scoring, &parsed.config, &stats, &write);
    }

    if parsed.config.output_format == OutputFormat::Daa {
        let names: Vec<String> = (0..db.len() as u32).map(|id| db.name(id).to_string()).collect();
        let lengths: Vec<u64> = (0..db.len() as u32).map(|id| db.length(id)).collect();
        write(&daa::encode_trailer(&names, &lengths));
    }

    if let Some(e) = write_err.into_inner().unwrap_or(None) {
        return Err(Error::io(parsed.output.clone().unwrap_or_default(), e));
    }

    let snapshot = stats.snapshot();
    tracing::info!(
        queries_processed = snapshot.queries_processed,
        hsps_reported = snapshot.hsps_reported,
        matrix_adjust_non_convergence = snapshot.matrix_adjust_non_convergence,
        lambda_solver_non_convergence = snapshot.lambda_solver_non_convergence,
        dp_overflow_retries = snapshot.dp_overflow_retries,
        "extension run complete"
    );

    Ok(())
}

fn main() {
    if let Err(err) = run() {
        tracing::error!("{err}");
        eprintln!("{err}");
        std::process::exit(err.get_code());
    }
}
