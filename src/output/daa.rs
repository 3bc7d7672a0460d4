//! DAA binary output format (`SPEC_FULL.md` §6.4): a 72-byte header 1, a
//! header 2 carrying run-wide scoring parameters, a sequence of per-query
//! records, and a trailer (target name dictionary + length array) rewritten
//! once final counts are known.

use crate::{model::Target, output::QueryMeta, transcript::Transcript};

/// Magic number identifying a DAA file, per §6.4.
pub const MAGIC: u64 = 0x3c0e_5347_6d3e_e36b;
pub const FORMAT_VERSION: u32 = 1;

/// The 72-byte fixed header: magic, version, and padding reserved for
/// forward-compatible fields.
#[must_use]
pub fn write_header1() -> [u8; 72] {
    let mut buf = [0u8; 72];
    buf[0..8].copy_from_slice(&MAGIC.to_le_bytes());
    buf[8..12].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf
}

/// Reads and validates a header 1 block, returning the format version.
#[must_use]
pub fn read_header1(buf: &[u8; 72]) -> Option<u32> {
    let magic = u64::from_le_bytes(buf[0..8].try_into().unwrap());
    if magic != MAGIC {
        return None;
    }
    Some(u32::from_le_bytes(buf[8..12].try_into().unwrap()))
}

/// Run-wide metadata written once after header 1 (§6.4).
#[derive(Debug, Clone)]
pub struct Header2 {
    pub build_number:   u32,
    pub db_seqs:         u64,
    pub db_seqs_used:    u64,
    pub db_letters:      u64,
    pub gap_open:        i32,
    pub gap_extend:      i32,
    pub lambda:          f64,
    pub k:                f64,
    pub evalue_cutoff:    f64,
    pub matrix_name:      String,
    pub block_types:      [u32; 3],
    pub block_sizes:      [u32; 3],
}

impl Header2 {
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.build_number.to_le_bytes());
        out.extend_from_slice(&self.db_seqs.to_le_bytes());
        out.extend_from_slice(&self.db_seqs_used.to_le_bytes());
        out.extend_from_slice(&self.db_letters.to_le_bytes());
        out.extend_from_slice(&self.gap_open.to_le_bytes());
        out.extend_from_slice(&self.gap_extend.to_le_bytes());
        out.extend_from_slice(&self.lambda.to_le_bytes());
        out.extend_from_slice(&self.k.to_le_bytes());
        out.extend_from_slice(&self.evalue_cutoff.to_le_bytes());
        out.extend_from_slice(&(self.matrix_name.len() as u32).to_le_bytes());
        out.extend_from_slice(self.matrix_name.as_bytes());
        for v in self.block_types {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for v in self.block_sizes {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    #[must_use]
    pub fn from_bytes(buf: &[u8]) -> Option<(Self, usize)> {
        let mut i = 0usize;
        let read_u32 = |buf: &[u8], i: &mut usize| -> u32 {
            let v = u32::from_le_bytes(buf[*i..*i + 4].try_into().unwrap());
            *i += 4;
            v
        };
        let read_u64 = |buf: &[u8], i: &mut usize| -> u64 {
            let v = u64::from_le_bytes(buf[*i..*i + 8].try_into().unwrap());
            *i += 8;
            v
        };
        let read_i32 = |buf: &[u8], i: &mut usize| -> i32 {
            let v = i32::from_le_bytes(buf[*i..*i + 4].try_into().unwrap());
            *i += 4;
            v
        };
        let read_f64 = |buf: &[u8], i: &mut usize| -> f64 {
            let v = f64::from_le_bytes(buf[*i..*i + 8].try_into().unwrap());
            *i += 8;
            v
        };

        let build_number = read_u32(buf, &mut i);
        let db_seqs = read_u64(buf, &mut i);
        let db_seqs_used = read_u64(buf, &mut i);
        let db_letters = read_u64(buf, &mut i);
        let gap_open = read_i32(buf, &mut i);
        let gap_extend = read_i32(buf, &mut i);
        let lambda = read_f64(buf, &mut i);
        let k = read_f64(buf, &mut i);
        let evalue_cutoff = read_f64(buf, &mut i);
        let name_len = read_u32(buf, &mut i) as usize;
        let matrix_name = String::from_utf8(buf.get(i..i + name_len)?.to_vec()).ok()?;
        i += name_len;
        let mut block_types = [0u32; 3];
        for slot in &mut block_types {
            *slot = read_u32(buf, &mut i);
        }
        let mut block_sizes = [0u32; 3];
        for slot in &mut block_sizes {
            *slot = read_u32(buf, &mut i);
        }

        Some((
            Self {
                build_number,
                db_seqs,
                db_seqs_used,
                db_letters,
                gap_open,
                gap_extend,
                lambda,
                k,
                evalue_cutoff,
                matrix_name,
                block_types,
                block_sizes,
            },
            i,
        ))
    }
}

/// Picks the smallest width (`0 => u8`, `1 => u16`, `2 => u32`) able to hold
/// `value`, and writes it in that width.
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

/// Encodes one query's per-match records: a 32-bit length prefix, the query
/// length, its zero-terminated id, a flags byte, the packed query sequence,
/// and one record per HSP across every target.
#[must_use]
pub fn encode_query_record(query: &QueryMeta, sequence: &[u8], targets: &[Target], dict_id_of: &impl Fn(u32) -> u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&query.query_len.to_le_bytes());
    body.extend_from_slice(query.name.as_bytes());
    body.push(0);
    let contains_n = sequence.iter().any(|&b| b.eq_ignore_ascii_case(&b'N'));
    body.push(u8::from(contains_n));
    body.extend_from_slice(sequence);

    for target in targets {
        let dict_id = dict_id_of(target.subject_id);
        for hsp in &target.hsps {
            let mut score_bytes = Vec::new();
            let score_flag = write_packed(&mut score_bytes, hsp.score.max(0) as u32);
            let mut qbegin_bytes = Vec::new();
            let qbegin_flag = write_packed(&mut qbegin_bytes, hsp.query_range.start);
            let mut sbegin_bytes = Vec::new();
            let sbegin_flag = write_packed(&mut sbegin_bytes, hsp.subject_range.start as u32);

            let flags = score_flag | (qbegin_flag << 2) | (sbegin_flag << 4);

            body.extend_from_slice(&dict_id.to_le_bytes());
            body.push(flags);
            body.extend_from_slice(&score_bytes);
            body.extend_from_slice(&qbegin_bytes);
            body.extend_from_slice(&sbegin_bytes);
            let packed = hsp.transcript.to_packed_bytes();
            body.extend_from_slice(&(packed.len() as u32).to_le_bytes());
            body.extend_from_slice(&packed);
        }
    }

    let mut out = Vec::with_capacity(body.len() + 4);
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

/// One decoded per-match record, the inverse of the match-record portion of
/// [`encode_query_record`].
#[derive(Debug, Clone)]
pub struct DecodedMatch {
    pub target_dict_id: u32,
    pub score:          u32,
    pub query_begin:    u32,
    pub subject_begin:  u32,
    pub transcript:     Transcript,
}

/// Decodes one query record body (without its length prefix) into its query
/// name/length and the list of per-match records.
#[must_use]
pub fn decode_query_record(body: &[u8]) -> Option<(u32, String, Vec<DecodedMatch>)> {
    let mut i = 0usize;
    let query_len = u32::from_le_bytes(body.get(0..4)?.try_into().unwrap());
    i += 4;
    let name_end = body[i..].iter().position(|&b| b == 0)? + i;
    let name = String::from_utf8(body[i..name_end].to_vec()).ok()?;
    i = name_end + 1;
    let _contains_n = body[i];
    i += 1;
    i += query_len as usize;

    let mut matches = Vec::new();
    while i < body.len() {
        let target_dict_id = u32::from_le_bytes(body.get(i..i + 4)?.try_into().unwrap());
        i += 4;
        let flags = body[i];
        i += 1;
        let score = read_packed(body, &mut i, flags & 0b11);
        let query_begin = read_packed(body, &mut i, (flags >> 2) & 0b11);
        let subject_begin = read_packed(body, &mut i, (flags >> 4) & 0b11);
        let transcript_len = u32::from_le_bytes(body.get(i..i + 4)?.try_into().unwrap()) as usize;
        i += 4;
        let transcript = Transcript::from_packed_bytes(body.get(i..i + transcript_len)?)?;
        i += transcript_len;
        matches.push(DecodedMatch {
            target_dict_id,
            score,
            query_begin,
            subject_begin,
            transcript,
        });
    }
    Some((query_len, name, matches))
}

/// The trailer: a dictionary of target names followed by a parallel array of
/// target lengths, rewritten at finish time once final counts are known
/// (§4.5).
#[must_use]
pub fn encode_trailer(names: &[String], lengths: &[u64]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(names.len() as u32).to_le_bytes());
    for name in names {
        out.extend_from_slice(&(name.len() as u32).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
    }
    for &len in lengths {
        out.extend_from_slice(&len.to_le_bytes());
    }
    out
}
