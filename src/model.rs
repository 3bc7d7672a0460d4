//! The core data model: seed hits, ungapped segments, targets, and HSPs
//! (`SPEC_FULL.md` §3).

use crate::transcript::Transcript;
use std::ops::Range;

/// One raw seed hit handed to the core by the (external) seeding stage.
///
/// Wire layout (§6.1): 16 bytes on 64-bit hosts, `{ query_id: u32,
/// target_position: u64, seed_offset: u32, score_hint: u16 }`. The struct
/// below keeps the same abstract fields but is laid out by the compiler; see
/// [`SeedHit::to_bytes`]/[`SeedHit::from_bytes`] for the wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedHit {
    pub query_id:        u32,
    pub target_position: u64,
    pub seed_offset:     u32,
    pub score_hint:      u16,
}

impl SeedHit {
    /// Packed little-endian wire size. §6.1 describes a naturally-aligned
    /// 16-byte host record; we use the packed 18-byte form it explicitly
    /// permits ("implementations may choose a smaller layout"), since a
    /// `#[repr(packed)]` struct with no alignment padding is more
    /// straightforward to read/write portably than relying on host padding.
    pub const WIRE_SIZE: usize = 18;

    /// The diagonal of this hit: `target_position - seed_offset` (§3).
    #[inline]
    #[must_use]
    pub fn diagonal(&self) -> i64 {
        self.target_position as i64 - self.seed_offset as i64
    }

    /// Encodes this hit using the fixed 18-byte little-endian wire layout.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::WIRE_SIZE] {
        let mut buf = [0u8; Self::WIRE_SIZE];
        buf[0..4].copy_from_slice(&self.query_id.to_le_bytes());
        buf[4..12].copy_from_slice(&self.target_position.to_le_bytes());
        buf[12..16].copy_from_slice(&self.seed_offset.to_le_bytes());
        buf[16..18].copy_from_slice(&self.score_hint.to_le_bytes());
        buf
    }

    /// Decodes a hit from the fixed 18-byte wire layout produced by
    /// [`SeedHit::to_bytes`].
    #[must_use]
    pub fn from_bytes(buf: &[u8; Self::WIRE_SIZE]) -> Self {
        Self {
            query_id:        u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            target_position: u64::from_le_bytes(buf[4..12].try_into().unwrap()),
            seed_offset:     u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            score_hint:      u16::from_le_bytes(buf[16..18].try_into().unwrap()),
        }
    }
}

/// A gap-free extension result, produced by x-drop ungapped extension from a
/// seed (§3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UngappedSegment {
    pub query_start:  u32,
    pub target_start: u64,
    pub length:       u32,
    pub score:        i32,
}

impl UngappedSegment {
    /// `score >= 0` is the data-model invariant for this type (§3).
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.score >= 0
    }

    #[inline]
    #[must_use]
    pub fn diagonal(&self) -> i64 {
        self.target_start as i64 - self.query_start as i64
    }
}

/// A high-scoring segment pair (§3). Ranges are half-open `[start, end)`.
#[derive(Debug, Clone)]
pub struct Hsp {
    pub frame:              i8,
    pub score:              i32,
    pub evalue:              f64,
    pub bit_score:           f64,
    pub query_range:        Range<u32>,
    pub subject_range:      Range<u64>,
    /// The range on the untranslated query nucleotide sequence, if
    /// translated search is in effect; equal to `query_range` otherwise.
    pub query_source_range: Range<u32>,
    pub transcript:          Transcript,
    pub identities:          u32,
    pub mismatches:          u32,
    pub gap_openings:        u32,
    pub positives:           u32,
    pub length:              u32,
}

impl Hsp {
    #[inline]
    #[must_use]
    pub fn percent_identity(&self) -> f64 {
        if self.length == 0 {
            0.0
        } else {
            100.0 * f64::from(self.identities) / f64::from(self.length)
        }
    }

    /// Fraction of `query_len` covered by this HSP's query range, as a
    /// percentage. Used by the output layer's query-cover filter.
    #[must_use]
    pub fn query_cover_percent(&self, query_len: u32) -> f64 {
        if query_len == 0 {
            0.0
        } else {
            100.0 * f64::from(self.query_range.end - self.query_range.start) / f64::from(query_len)
        }
    }

    #[must_use]
    pub fn subject_cover_percent(&self, subject_len: u64) -> f64 {
        if subject_len == 0 {
            0.0
        } else {
            100.0 * (self.subject_range.end - self.subject_range.start) as f64 / subject_len as f64
        }
    }

    /// Whether `self` and `other`'s query ranges overlap by at least 50% of
    /// the shorter HSP's length, the inner-culling envelope test (§3, §8).
    #[must_use]
    pub fn envelops(&self, other: &Hsp) -> bool {
        let overlap_start = self.query_range.start.max(other.query_range.start);
        let overlap_end = self.query_range.end.min(other.query_range.end);
        if overlap_end <= overlap_start {
            return false;
        }
        let overlap = u64::from(overlap_end - overlap_start);
        let self_len = u64::from(self.query_range.end - self.query_range.start);
        let other_len = u64::from(other.query_range.end - other.query_range.start);
        let shorter = self_len.min(other_len);
        shorter > 0 && overlap * 2 >= shorter
    }
}

/// A candidate reference subject for one query, accumulating HSPs across
/// pipeline stages (§3).
#[derive(Debug, Clone)]
pub struct Target {
    pub subject_id:    u32,
    /// Indices into the query's sorted seed-hit slice that belong to this
    /// subject.
    pub hit_range:     Range<usize>,
    pub filter_score:  i32,
    pub filter_evalue: f64,
    pub hsps:          Vec<Hsp>,
    pub taxon_ids:     Vec<u32>,
}

impl Target {
    #[must_use]
    pub fn new(subject_id: u32, hit_range: Range<usize>) -> Self {
        Self {
            subject_id,
            hit_range,
            filter_score: 0,
            filter_evalue: f64::INFINITY,
            hsps: Vec::new(),
            taxon_ids: Vec::new(),
        }
    }

    /// Recomputes `filter_score`/`filter_evalue` as the best remaining HSP,
    /// restoring the §3 invariant after culling removes HSPs.
    pub fn refresh_filter_from_hsps(&mut self) {
        if let Some(best) = self.hsps.iter().max_by_key(|h| h.score) {
            self.filter_score = best.score;
            self.filter_evalue = best.evalue;
        }
    }
}

/// Per-query context owned by the mapper: translated frames and optional
/// composition-based bias corrections (§3).
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub query_id: u32,
    /// One sequence per translated frame. Always length 1 in this core,
    /// since translated six-frame search is not implemented (`DESIGN.md`);
    /// the `Vec` shape is kept because other `SPEC_FULL.md` §6 contracts
    /// (e.g. `SeedHit.query_id` "addressing one of the translated frames of
    /// a query") are written against a multi-frame model.
    pub frames:   Vec<Vec<u8>>,
    /// Per-residue composition bias, one vector per frame, empty if CBS is
    /// off.
    pub bias:     Vec<Vec<i32>>,
}

impl QueryContext {
    #[must_use]
    pub fn new(query_id: u32, frames: Vec<Vec<u8>>) -> Self {
        let bias = vec![Vec::new(); frames.len()];
        Self { query_id, frames, bias }
    }

    /// Length of the representative frame used for dimensioning (§9 open
    /// question): frame 0's length is used as the banding proxy.
    #[inline]
    #[must_use]
    pub fn representative_len(&self) -> usize {
        self.frames.first().map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_hit_round_trips_through_wire_bytes() {
        let hit = SeedHit {
            query_id:        7,
            target_position: 123_456,
            seed_offset:     42,
            score_hint:      0,
        };
        let bytes = hit.to_bytes();
        let back = SeedHit::from_bytes(&bytes);
        assert_eq!(hit, back);
    }

    #[test]
    fn diagonal_is_target_minus_query() {
        let hit = SeedHit {
            query_id:        0,
            target_position: 100,
            seed_offset:     10,
            score_hint:      0,
        };
        assert_eq!(hit.diagonal(), 90);
    }

    #[test]
    fn envelops_requires_half_overlap_of_shorter() {
        let transcript = Transcript::default();
        let make = |s: u32, e: u32, score: i32| Hsp {
            frame: 0,
            score,
            evalue: 0.0,
            bit_score: 0.0,
            query_range: s..e,
            subject_range: 0..(e - s) as u64,
            query_source_range: s..e,
            transcript: transcript.clone(),
            identities: 0,
            mismatches: 0,
            gap_openings: 0,
            positives: 0,
            length: e - s,
        };
        let strong = make(0, 100, 200);
        let weak_enveloped = make(10, 60, 50); // 50/50 = 100% overlap of the shorter
        let weak_disjoint = make(200, 260, 50);
        assert!(strong.envelops(&weak_enveloped));
        assert!(!strong.envelops(&weak_disjoint));
    }
}
