//! The target database collaborator (`SPEC_FULL.md` §6.3): read-only access
//! to reference sequences, titles, and taxon ids by block id, plus the
//! per-chunk dictionary translation the join-blocks layer relies on.

use crate::{
    error::{Error, ResultWithPathContext},
    output::TargetMeta,
};
use std::path::Path;
use zoe::{data::fasta::FastaSeq, prelude::FastaReader};

/// Read-only access to one loaded reference block. `block_id` indexes
/// directly into the in-memory sequence vector; a separate per-chunk
/// dictionary (§6.4 DAA/intermediate formats) maps to a stable global id
/// when the reference set is processed in chunks (§4.5).
pub trait TargetDatabase {
    fn sequence(&self, block_id: u32) -> &[u8];
    fn name(&self, block_id: u32) -> &str;
    fn length(&self, block_id: u32) -> u64;
    fn taxon_ids(&self, block_id: u32) -> &[u32];
    fn len(&self) -> usize;
    #[must_use]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    fn meta(&self, block_id: u32) -> TargetMeta {
        TargetMeta {
            subject_id: block_id,
            name:       self.name(block_id).to_string(),
            length:     self.length(block_id),
        }
    }
}

/// A whole reference set loaded into memory, the simple non-chunked
/// implementation of [`TargetDatabase`]. Blocked processing (§4.5) loads one
/// [`InMemoryDatabase`] per chunk and assigns global ids via an external
/// dictionary rather than through this type.
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    names:     Vec<String>,
    sequences: Vec<Vec<u8>>,
    taxon_ids: Vec<Vec<u32>>,
}

impl InMemoryDatabase {
    /// Reads every record of a FASTA reference file into memory, assigning
    /// block ids in file order.
    pub fn from_fasta_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let reader = FastaReader::from_filename(path).with_path(path)?;
        let mut db = Self::default();
        for record in reader {
            let FastaSeq { name, sequence } = record.with_path(path)?;
            db.names.push(name);
            db.sequences.push(sequence);
            db.taxon_ids.push(Vec::new());
        }
        Ok(db)
    }

    /// Attaches taxon ids to an already-loaded block, used when a taxonomy
    /// mapping file is supplied alongside the reference FASTA.
    pub fn set_taxon_ids(&mut self, block_id: u32, taxon_ids: Vec<u32>) {
        if let Some(slot) = self.taxon_ids.get_mut(block_id as usize) {
            *slot = taxon_ids;
        }
    }

    /// Builds a database directly from in-memory `(name, sequence)` pairs,
    /// bypassing FASTA parsing — used by tests and by callers that already
    /// hold decoded sequences (e.g. a single-record query-as-database case).
    #[must_use]
    pub fn from_records(records: Vec<(String, Vec<u8>)>) -> Self {
        let mut db = Self::default();
        for (name, sequence) in records {
            db.names.push(name);
            db.sequences.push(sequence);
            db.taxon_ids.push(Vec::new());
        }
        db
    }
}

impl TargetDatabase for InMemoryDatabase {
    #[inline]
    fn sequence(&self, block_id: u32) -> &[u8] {
        &self.sequences[block_id as usize]
    }

    #[inline]
    fn name(&self, block_id: u32) -> &str {
        &self.names[block_id as usize]
    }

    #[inline]
    fn length(&self, block_id: u32) -> u64 {
        self.sequences[block_id as usize].len() as u64
    }

    #[inline]
    fn taxon_ids(&self, block_id: u32) -> &[u32] {
        &self.taxon_ids[block_id as usize]
    }

    #[inline]
    fn len(&self) -> usize {
        self.sequences.len()
    }
}

/// Translates a per-chunk dictionary id back to a stable global subject id
/// across reference chunks (§4.5, §6.3). Chunk boundaries are contiguous
/// ranges of global ids, so the mapping is a cumulative offset lookup.
#[derive(Debug, Default)]
pub struct ChunkDictionary {
    chunk_offsets: Vec<u32>,
}

impl ChunkDictionary {
    /// Builds the dictionary from each chunk's sequence count, in load order.
    #[must_use]
    pub fn new(chunk_sizes: &[u32]) -> Self {
        let mut chunk_offsets = Vec::with_capacity(chunk_sizes.len());
        let mut offset = 0u32;
        for &size in chunk_sizes {
            chunk_offsets.push(offset);
            offset += size;
        }
        Self { chunk_offsets }
    }

    #[must_use]
    pub fn global_id(&self, chunk_index: usize, local_dict_id: u32) -> u32 {
        self.chunk_offsets[chunk_index] + local_dict_id
    }
}

/// A read-only, contiguous slice of an [`InMemoryDatabase`] addressed by
/// local ids `0..len`, used to hand one reference chunk to the pipeline
/// without re-reading or copying the underlying sequences (§4.5).
pub struct DatabaseSlice<'a> {
    inner: &'a InMemoryDatabase,
    start: u32,
    len:   u32,
}

impl<'a> DatabaseSlice<'a> {
    #[must_use]
    pub fn new(inner: &'a InMemoryDatabase, start: u32, len: u32) -> Self {
        Self { inner, start, len }
    }
}

impl TargetDatabase for DatabaseSlice<'_> {
    #[inline]
    fn sequence(&self, block_id: u32) -> &[u8] {
        self.inner.sequence(self.start + block_id)
    }

    #[inline]
    fn name(&self, block_id: u32) -> &str {
        self.inner.name(self.start + block_id)
    }

    #[inline]
    fn length(&self, block_id: u32) -> u64 {
        self.inner.length(self.start + block_id)
    }

    #[inline]
    fn taxon_ids(&self, block_id: u32) -> &[u32] {
        self.inner.taxon_ids(self.start + block_id)
    }

    #[inline]
    fn len(&self) -> usize {
        self.len as usize
    }
}

/// Splits `total` ids into chunks of `chunks` nearly-equal contiguous
/// ranges, in ascending id order (§4.5). Returns fewer than `chunks` entries
/// if `total < chunks`; never returns a zero-sized chunk.
#[must_use]
pub fn chunk_sizes(total: u32, chunks: usize) -> Vec<u32> {
    let chunks = chunks.max(1);
    if total == 0 {
        return Vec::new();
    }
    let per_chunk = (total as usize).div_ceil(chunks) as u32;
    let mut sizes = Vec::new();
    let mut remaining = total;
    while remaining > 0 {
        let size = per_chunk.min(remaining);
        sizes.push(size);
        remaining -= size;
    }
    sizes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_db() -> InMemoryDatabase {
        InMemoryDatabase {
            names:     vec!["sp|P1|ONE".into(), "sp|P2|TWO".into()],
            sequences: vec![b"MKTAYI".to_vec(), b"AWGHEE".to_vec()],
            taxon_ids: vec![vec![9606], vec![]],
        }
    }

    #[test]
    fn meta_reflects_name_and_length() {
        let db = sample_db();
        let meta = db.meta(0);
        assert_eq!(meta.name, "sp|P1|ONE");
        assert_eq!(meta.length, 6);
    }

    #[test]
    fn taxon_ids_are_per_block() {
        let db = sample_db();
        assert_eq!(db.taxon_ids(0), &[9606]);
        assert!(db.taxon_ids(1).is_empty());
    }

    #[test]
    fn chunk_dictionary_translates_local_to_global_ids() {
        let dict = ChunkDictionary::new(&[3, 5]);
        assert_eq!(dict.global_id(0, 2), 2);
        assert_eq!(dict.global_id(1, 0), 3);
        assert_eq!(dict.global_id(1, 4), 7);
    }

    #[test]
    fn database_slice_addresses_relative_to_its_start() {
        let db = sample_db();
        let slice = DatabaseSlice::new(&db, 1, 1);
        assert_eq!(slice.len(), 1);
        assert_eq!(slice.name(0), "sp|P2|TWO");
        assert_eq!(slice.sequence(0), b"AWGHEE");
    }

    #[test]
    fn chunk_sizes_splits_into_nearly_equal_contiguous_ranges() {
        assert_eq!(chunk_sizes(10, 4), vec![3, 3, 3, 1]);
        assert_eq!(chunk_sizes(5, 1), vec![5]);
        assert_eq!(chunk_sizes(0, 4), Vec::<u32>::new());
    }
}
