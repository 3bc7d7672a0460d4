//! Intermediate binary records for blocked processing (`SPEC_FULL.md` §4.5,
//! §6.4, §6.6) and the join-blocks merge across reference chunks.

use crate::{
    config::Config,
    culling::cull_targets,
    model::{Hsp, Target},
    transcript::Transcript,
};

/// Marks the end of one query's records within a chunk file.
pub const END_OF_QUERY: u32 = 0;
/// Marks the end of the whole intermediate file.
pub const END_OF_FILE: u32 = 0xFFFF_FFFF;

fn write_packed(out: &mut Vec<u8>, value: u32) -> u8 {
    if let Ok(v) = u8::try_from(value) {
        out.push(v);
        0
    } else if let Ok(v) = u16::try_from(value) {
        out.extend_from_slice(&v.to_le_bytes());
        1
    } else {
        out.extend_from_slice(&value.to_le_bytes());
        2
    }
}

fn read_packed(buf: &[u8], i: &mut usize, flag: u8) -> u32 {
    match flag {
        0 => {
            let v = buf[*i] as u32;
            *i += 1;
            v
        }
        1 => {
            let v = u16::from_le_bytes(buf[*i..*i + 2].try_into().unwrap()) as u32;
            *i += 2;
            v
        }
        _ => {
            let v = u32::from_le_bytes(buf[*i..*i + 4].try_into().unwrap());
            *i += 4;
            v
        }
    }
}

/// Appends one HSP's record to `out`.
pub fn write_record(out: &mut Vec<u8>, target_dict_id: u32, hsp: &Hsp) {
    let mut score_bytes = Vec::new();
    let score_flag = write_packed(&mut score_bytes, hsp.score.max(0) as u32);
    let mut qbegin_bytes = Vec::new();
    let qbegin_flag = write_packed(&mut qbegin_bytes, hsp.query_range.start);
    let mut sbegin_bytes = Vec::new();
    let sbegin_flag = write_packed(&mut sbegin_bytes, hsp.subject_range.start as u32);
    let flag = score_flag | (qbegin_flag << 2) | (sbegin_flag << 4);

    out.extend_from_slice(&target_dict_id.to_le_bytes());
    out.push(flag);
    out.extend_from_slice(&score_bytes);
    out.extend_from_slice(&qbegin_bytes);
    out.extend_from_slice(&sbegin_bytes);
    let packed = hsp.transcript.to_packed_bytes();
    out.extend_from_slice(&(packed.len() as u32).to_le_bytes());
    out.extend_from_slice(&packed);
}

/// Appends the end-of-query marker.
pub fn write_end_of_query(out: &mut Vec<u8>) {
    out.extend_from_slice(&END_OF_QUERY.to_le_bytes());
}

/// Appends the end-of-file sentinel.
pub fn write_end_of_file(out: &mut Vec<u8>) {
    out.extend_from_slice(&END_OF_FILE.to_le_bytes());
}

/// Encodes one query's raw, unfiltered per-chunk records (one per HSP across
/// every target surviving the pipeline), terminated by [`END_OF_QUERY`].
/// Blocked mode writes this per chunk instead of a rendered output record;
/// the §4.5 output filters and global culling apply once, in
/// [`merge_chunks`], after every chunk's records for a query are combined.
#[must_use]
pub fn encode_query_intermediate(targets: &[Target], dict_id_of: &impl Fn(u32) -> u32) -> Vec<u8> {
    let mut out = Vec::new();
    for target in targets {
        let dict_id = dict_id_of(target.subject_id);
        for hsp in &target.hsps {
            write_record(&mut out, dict_id, hsp);
        }
    }
    write_end_of_query(&mut out);
    out
}

/// One decoded intermediate record.
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    pub target_dict_id: u32,
    pub score:          u32,
    pub query_begin:    u32,
    pub subject_begin:  u32,
    pub transcript:     Transcript,
}

/// Reads one query's worth of records starting at `buf[*i]`, stopping at an
/// [`END_OF_QUERY`] or [`END_OF_FILE`] marker (which is left unconsumed so
/// the caller can detect end-of-file). Returns `None` at [`END_OF_FILE`].
pub fn read_query_records(buf: &[u8], i: &mut usize) -> Option<Vec<DecodedRecord>> {
    let mut records = Vec::new();
    loop {
        let marker = u32::from_le_bytes(buf[*i..*i + 4].try_into().unwrap());
        if marker == END_OF_FILE {
            return if records.is_empty() { None } else { Some(records) };
        }
        if marker == END_OF_QUERY {
            *i += 4;
            return Some(records);
        }
        let target_dict_id = marker;
        *i += 4;
        let flag = buf[*i];
        *i += 1;
        let score = read_packed(buf, i, flag & 0b11);
        let query_begin = read_packed(buf, i, (flag >> 2) & 0b11);
        let subject_begin = read_packed(buf, i, (flag >> 4) & 0b11);
        let transcript_len = u32::from_le_bytes(buf[*i..*i + 4].try_into().unwrap()) as usize;
        *i += 4;
        let transcript = Transcript::from_packed_bytes(&buf[*i..*i + transcript_len]).unwrap_or_default();
        *i += transcript_len;
        records.push(DecodedRecord {
            target_dict_id,
            score,
            query_begin,
            subject_begin,
            transcript,
        });
    }
}

/// Merges one query's decoded records across every reference chunk into a
/// ranked [`Target`] list, re-applying global culling since a target's
/// best HSP may be in a different chunk than its second-best (§4.5).
/// `global_id_of` maps each chunk's local `(chunk_index, dict_id)` pair to a
/// stable global subject id. `bit_score_of`/`evalue_of` recompute those
/// statistics from `(score, subject_len)` since the wire format (§6.6) does
/// not carry them directly.
#[must_use]
pub fn merge_chunks(
    chunks: &[Vec<DecodedRecord>], global_id_of: &impl Fn(usize, u32) -> u32, config: &Config, bit_score_of: &impl Fn(i32) -> f64, evalue_of: &impl Fn(i32, u64) -> f64,
) -> Vec<Target> {
    use crate::utils::fast_map;

    let mut by_subject: std::collections::HashMap<u32, Target, foldhash::fast::RandomState> = fast_map();

    for (chunk_index, records) in chunks.iter().enumerate() {
        for record in records {
            let subject_id = global_id_of(chunk_index, record.target_dict_id);
            let target = by_subject.entry(subject_id).or_insert_with(|| Target::new(subject_id, 0..0));
            let score = record.score as i32;
            let subject_len = record.transcript.subject_length();
            let query_len = record.transcript.query_length();
            let hsp = Hsp {
                frame: 0,
                score,
                evalue: evalue_of(score, u64::from(subject_len)),
                bit_score: bit_score_of(score),
                query_range: record.query_begin..record.query_begin + query_len,
                subject_range: u64::from(record.subject_begin)..u64::from(record.subject_begin) + u64::from(subject_len),
                query_source_range: record.query_begin..record.query_begin + query_len,
                transcript: record.transcript.clone(),
                identities: 0,
                mismatches: 0,
                gap_openings: 0,
                positives: 0,
                length: query_len.max(subject_len),
            };
            target.filter_evalue = target.filter_evalue.min(hsp.evalue);
            target.hsps.push(hsp);
            target.filter_score = target.filter_score.max(score);
        }
    }

    let mut targets: Vec<Target> = by_subject.into_values().collect();
    cull_targets(&mut targets, config);
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::EditOp;

    #[test]
    fn record_round_trips_through_query_boundary() {
        let hsp = Hsp {
            frame: 0,
            score: 77,
            evalue: 1e-8,
            bit_score: 50.0,
            query_range: 5..15,
            subject_range: 100..110,
            query_source_range: 5..15,
            transcript: Transcript::new(vec![EditOp::Match(10)]),
            identities: 10,
            mismatches: 0,
            gap_openings: 0,
            positives: 10,
            length: 10,
        };
        let mut buf = Vec::new();
        write_record(&mut buf, 42, &hsp);
        write_end_of_query(&mut buf);
        write_end_of_file(&mut buf);

        let mut i = 0;
        let records = read_query_records(&buf, &mut i).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target_dict_id, 42);
        assert_eq!(records[0].score, 77);

        let next = read_query_records(&buf, &mut i);
        assert!(next.is_none());
    }

    #[test]
    fn encode_query_intermediate_round_trips_through_read_query_records() {
        let mut target = Target::new(3, 0..0);
        target.hsps.push(Hsp {
            frame: 0,
            score: 90,
            evalue: 1e-9,
            bit_score: 40.0,
            query_range: 0..12,
            subject_range: 0..12,
            query_source_range: 0..12,
            transcript: Transcript::new(vec![EditOp::Match(12)]),
            identities: 12,
            mismatches: 0,
            gap_openings: 0,
            positives: 12,
            length: 12,
        });
        let mut buf = encode_query_intermediate(&[target], &|id| id);
        write_end_of_file(&mut buf);

        let mut i = 0;
        let records = read_query_records(&buf, &mut i).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target_dict_id, 3);
        assert_eq!(records[0].score, 90);
    }

    #[test]
    fn merge_chunks_combines_same_subject_across_chunks() {
        let chunk_a = vec![DecodedRecord {
            target_dict_id: 1,
            score: 50,
            query_begin: 0,
            subject_begin: 0,
            transcript: Transcript::new(vec![EditOp::Match(20)]),
        }];
        let chunk_b = vec![DecodedRecord {
            target_dict_id: 7,
            score: 80,
            query_begin: 0,
            subject_begin: 0,
            transcript: Transcript::new(vec![EditOp::Match(30)]),
        }];
        let config = Config::default();
        let targets = merge_chunks(&[chunk_a, chunk_b], &|_chunk, dict_id| dict_id, &config, &|score| f64::from(score), &|score, _subject_len| 1.0 / f64::from(score.max(1)));
        assert_eq!(targets.len(), 2);
    }
}
