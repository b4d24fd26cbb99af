//! The read-side query engine.
//!
//! Bundles the hash index, the reads store, and the positional arrays
//! behind one handle. Everything here is read-only over shared
//! mappings: any number of threads may query concurrently.
//!
//! Query-time anomalies never error. An unknown k-mer, a wrong-length
//! query, or non-ACGT input yields zero / empty / `NotFound`.

use crate::codec::{reverse_complement, Strand};
use crate::constants::DEFAULT_MAX_TF;
use crate::error::{IndexError, Result};
use crate::files::IndexPaths;
use crate::hash_index::KmerIndex;
use crate::mapped::TypedMap;
use crate::reads::{ReadView, ReadsStore, Subread};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::cmp::Reverse;
use std::path::Path;
use tracing::{info, warn};

/// One read containing a queried k-mer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmerHit {
    /// Read id.
    pub rid: usize,
    /// Subread holding the hit: 0, or 1 for the second mate.
    pub subread: usize,
    /// Offset of the k-mer within that subread.
    pub offset: usize,
    /// Strand of the hit relative to the query.
    pub strand: Strand,
    /// The subread bytes.
    pub read: Vec<u8>,
}

/// Read-only handle over a fully built index.
#[derive(Debug)]
pub struct QueryEngine {
    index: KmerIndex,
    reads: ReadsStore,
    indices: TypedMap<u64>,
    positions: TypedMap<u64>,
    max_tf: u32,
}

impl QueryEngine {
    /// Open every component of an index family.
    ///
    /// `prefix` names the hash and positional files; `reads_path` /
    /// `ridx_path` name the corpus. Pass `direct = true` for a k=13
    /// index (no `.pf` / `.kmers.bin` involved). All cross-file
    /// consistency checks run here; a failure returns the error and no
    /// handle.
    pub fn open(
        paths: &IndexPaths,
        reads_path: &Path,
        ridx_path: &Path,
        direct: bool,
        max_tf: u32,
    ) -> Result<Self> {
        let index = if direct {
            KmerIndex::open_direct(&paths.tf())?
        } else {
            KmerIndex::open_mphf(&paths.pf(), &paths.kmers(), &paths.tf())?
        };
        let reads = ReadsStore::open(reads_path, ridx_path)?;
        let indices = TypedMap::<u64>::open(&paths.indices())?;
        let positions = TypedMap::<u64>::open(&paths.existing_positions())?;
        Self::new(index, reads, indices, positions, max_tf)
    }

    /// Assemble an engine from already-opened parts, validating the
    /// positional arrays against the hash index.
    pub fn new(
        index: KmerIndex,
        reads: ReadsStore,
        indices: TypedMap<u64>,
        positions: TypedMap<u64>,
        max_tf: u32,
    ) -> Result<Self> {
        let n = index.n();
        indices.expect_len(n + 1, "prefix-sum array")?;

        let offsets = indices.as_slice();
        if offsets[0] != 0 {
            return Err(IndexError::corrupt(
                indices.path(),
                format!("prefix sum must start at 0, found {}", offsets[0]),
            ));
        }
        if let Some(at) = offsets.windows(2).position(|w| w[0] > w[1]) {
            return Err(IndexError::corrupt(
                indices.path(),
                format!("prefix sum decreases at entry {at}"),
            ));
        }
        let total: u64 = index.tf_slice().iter().map(|&v| v as u64).sum();
        if offsets[n] != total {
            return Err(IndexError::corrupt(
                indices.path(),
                format!("prefix sum total {} does not match Σtf = {total}", offsets[n]),
            ));
        }
        positions.expect_len(total as usize, "positions array")?;

        info!(
            "opened index: {} ids, {} positions, {} reads",
            n,
            positions.len(),
            reads.n_reads()
        );
        Ok(Self {
            index,
            reads,
            indices,
            positions,
            max_tf: if max_tf == 0 { DEFAULT_MAX_TF } else { max_tf },
        })
    }

    /// K-mer length of the index.
    #[inline]
    pub fn k(&self) -> usize {
        self.index.k()
    }

    /// Number of ids in the index.
    #[inline]
    pub fn n(&self) -> usize {
        self.index.n()
    }

    /// The underlying hash index.
    #[inline]
    pub fn index(&self) -> &KmerIndex {
        &self.index
    }

    /// The underlying reads store.
    #[inline]
    pub fn reads(&self) -> &ReadsStore {
        &self.reads
    }

    /// Term frequency of a k-mer (0 when absent).
    #[inline]
    pub fn tf(&self, kmer: &[u8]) -> u32 {
        self.index.get_tf(kmer)
    }

    /// Hash id of a k-mer.
    #[inline]
    pub fn id(&self, kmer: &[u8]) -> Option<u64> {
        self.index.get_id(kmer)
    }

    /// Strand on which the query matches the stored canonical form.
    #[inline]
    pub fn strand(&self, kmer: &[u8]) -> Strand {
        self.index.get_strand(kmer)
    }

    /// Canonical k-mer string for an id.
    #[inline]
    pub fn kmer_of(&self, id: u64) -> Option<String> {
        self.index.kmer_of(id)
    }

    /// Raw positional slice for an id (1-based offsets, 0 = empty).
    fn slots_of_id(&self, id: u64) -> &[u64] {
        let offsets = self.indices.as_slice();
        let (from, to) = (offsets[id as usize] as usize, offsets[id as usize + 1] as usize);
        &self.positions.as_slice()[from..to]
    }

    /// Absolute 0-based blob offsets of every stored occurrence.
    ///
    /// Empty for unknown k-mers. Order is unspecified; the result is
    /// capped at the engine's `max_tf`.
    pub fn positions(&self, kmer: &[u8]) -> Vec<u64> {
        let Some(id) = self.index.get_id(kmer) else {
            return Vec::new();
        };
        self.slots_of_id(id)
            .iter()
            .filter(|&&slot| slot != 0)
            .take(self.max_tf as usize)
            .map(|&slot| slot - 1)
            .collect()
    }

    /// The read containing an absolute blob offset.
    #[inline]
    pub fn read_of_offset(&self, offset: u64) -> Option<ReadView<'_>> {
        self.reads.read_of_offset(offset)
    }

    /// Read bytes by id.
    #[inline]
    pub fn read_by_rid(&self, rid: usize) -> &[u8] {
        self.reads.read_by_rid(rid)
    }

    /// Copy a blob range, optionally reverse-complemented.
    #[inline]
    pub fn read_slice(&self, start: u64, end: u64, revcomp: bool) -> Vec<u8> {
        self.reads.read_slice(start, end, revcomp)
    }

    /// Iterate `(rid, read_bytes)` over the whole corpus.
    pub fn iter_reads(&self) -> impl Iterator<Item = (usize, &[u8])> {
        self.reads.iter_reads()
    }

    /// Iterate subreads, the second mate flagged reverse-complemented.
    pub fn iter_paired_subreads(&self) -> impl Iterator<Item = Subread<'_>> {
        self.reads.iter_paired_subreads()
    }

    /// `(kmer, tf)` pairs in descending tf order.
    ///
    /// Keeps at most `max_count` entries with `tf >= min_tf`. The MPHF
    /// path walks the tf array once with a bounded heap; the direct
    /// path additionally skips its (many) empty slots the same way.
    pub fn iter_by_frequency(
        &self,
        min_tf: u32,
        max_count: usize,
    ) -> impl Iterator<Item = (String, u32)> + '_ {
        let min_tf = min_tf.max(1);
        let mut heap: BinaryHeap<Reverse<(u32, u64)>> = BinaryHeap::with_capacity(max_count + 1);
        for (id, &tf) in self.index.tf_slice().iter().enumerate() {
            if tf < min_tf {
                continue;
            }
            heap.push(Reverse((tf, id as u64)));
            if heap.len() > max_count {
                heap.pop();
            }
        }
        let mut top: Vec<(u32, u64)> = heap.into_iter().map(|Reverse(pair)| pair).collect();
        top.sort_unstable_by(|a, b| b.cmp(a));
        top.into_iter().filter_map(move |(tf, id)| {
            self.index.kmer_of(id).map(|kmer| (kmer, tf))
        })
    }

    /// Map rid → in-read offsets of a k-mer's occurrences.
    pub fn rid_to_local_positions(&self, kmer: &[u8]) -> HashMap<usize, Vec<usize>> {
        let mut hits: HashMap<usize, Vec<usize>> = HashMap::new();
        for offset in self.positions(kmer) {
            if let Some(view) = self.reads.read_of_offset(offset) {
                hits.entry(view.rid).or_default().push(view.local_of(offset));
            }
        }
        hits
    }

    /// Reads containing a k-mer, deduplicated by rid up to `max_reads`.
    ///
    /// Each hit reports the subread that holds it, the k-mer's offset
    /// within that subread, and the strand obtained by comparing the
    /// read window against the query. A window matching neither the
    /// query nor its reverse complement indicates a corrupt index and
    /// is skipped with a warning.
    pub fn kmer_to_reads(&self, kmer: &[u8], max_reads: usize) -> Vec<KmerHit> {
        let k = self.k();
        let Some(query) = crate::codec::pack(kmer, k) else {
            return Vec::new();
        };
        let query_rc = reverse_complement(query, k);

        let mut seen: HashSet<usize> = HashSet::new();
        let mut hits = Vec::new();
        for offset in self.positions(kmer) {
            if hits.len() >= max_reads {
                break;
            }
            let Some(view) = self.reads.read_of_offset(offset) else {
                warn!("stored position {offset} resolves to no read");
                continue;
            };
            if !seen.insert(view.rid) {
                continue;
            }
            let local = view.local_of(offset);
            if local + k > view.bytes.len() {
                warn!("stored position {offset} overruns its read; index corrupt?");
                continue;
            }
            let window = &view.bytes[local..local + k];
            let strand = match crate::codec::pack(window, k) {
                Some(word) if word == query => Strand::Forward,
                Some(word) if word == query_rc => Strand::Reverse,
                _ => {
                    warn!(
                        "window at offset {offset} does not match the queried k-mer; index corrupt?"
                    );
                    continue;
                }
            };
            // Report against the subread that holds the hit.
            let (subread, sub_offset, sub_bytes) =
                match view.bytes.iter().position(|&b| b == b'~') {
                    Some(at) if local > at => (1, local - at - 1, &view.bytes[at + 1..]),
                    Some(at) => (0, local, &view.bytes[..at]),
                    None => (0, local, view.bytes),
                };
            hits.push(KmerHit {
                rid: view.rid,
                subread,
                offset: sub_offset,
                strand,
                read: sub_bytes.to_vec(),
            });
        }
        hits
    }

    /// Per-window tf profile of an arbitrary sequence.
    ///
    /// Entry `i` is the tf of the window starting at `i`; windows with
    /// tf below `cutoff`, or containing invalid bases, read zero.
    pub fn sequence_coverage(&self, seq: &[u8], cutoff: u32) -> Vec<u32> {
        let k = self.k();
        if seq.len() < k {
            return Vec::new();
        }
        let mut coverage = vec![0u32; seq.len() - k + 1];
        for (i, slot) in coverage.iter_mut().enumerate() {
            let tf = self.tf(&seq[i..i + k]);
            if tf >= cutoff {
                *slot = tf;
            }
        }
        coverage
    }

    /// `(window, tf)` for every k-window of a sequence.
    pub fn iter_sequence_kmers<'a>(
        &'a self,
        seq: &'a [u8],
    ) -> impl Iterator<Item = (&'a [u8], u32)> + 'a {
        let k = self.k();
        (0..seq.len().saturating_sub(k - 1)).map(move |i| {
            let window = &seq[i..i + k];
            (window, self.tf(window))
        })
    }
}
