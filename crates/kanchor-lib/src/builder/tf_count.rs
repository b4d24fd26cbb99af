//! Parallel term-frequency counting over the reads blob.
//!
//! The blob is split into one contiguous byte range per worker; each
//! worker advances its start to the next read boundary, then scans
//! whole reads so no window is counted twice or crosses a boundary.
//! Counters are relaxed atomic adds; thread joins establish the
//! happens-before that makes the final values exact.

use crate::codec::{CanonicalWindows, Strand};
use crate::error::{IndexError, Result};
use crate::hash_index::KmerResolver;
use crate::reads::ReadsStore;
use std::ops::Range;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tracing::{debug, info};

/// Split `len` bytes into at most `workers` contiguous ranges.
pub(crate) fn partition_ranges(len: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let chunk = len.div_ceil(workers).max(1);
    let mut ranges = Vec::new();
    let mut start = 0;
    while start < len {
        let end = (start + chunk).min(len);
        ranges.push(start..end);
        start = end;
    }
    ranges
}

/// Visit every valid k-window of every read whose start lies in
/// `range`, calling `visit(absolute_offset, canonical_word, strand)`.
///
/// A worker owns a read iff the read starts inside its range, so it may
/// scan past `range.end` to finish the last owned read.
pub(crate) fn scan_range<F>(blob: &[u8], range: Range<usize>, k: usize, mut visit: F)
where
    F: FnMut(u64, u64, Strand),
{
    let mut pos = range.start;
    if pos > 0 && blob[pos - 1] != b'\n' {
        // Mid-read entry: the previous worker owns this read.
        match blob[pos..range.end.min(blob.len())]
            .iter()
            .position(|&b| b == b'\n')
        {
            Some(at) => pos += at + 1,
            None => return,
        }
    }
    while pos < range.end {
        let end = blob[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|at| pos + at)
            .unwrap_or(blob.len());
        for (local, canonical, strand) in CanonicalWindows::new(&blob[pos..end], k) {
            visit((pos + local) as u64, canonical, strand);
        }
        pos = end + 1;
    }
}

/// Count canonical k-mer occurrences across the whole reads store.
///
/// Occurrences whose canonical form is not resolvable (not in the
/// build set) are skipped silently. Returns the exact per-id counts.
pub fn count_tf(reads: &ReadsStore, resolver: &KmerResolver, threads: usize) -> Result<Vec<u32>> {
    let n = resolver.n();
    let k = resolver.k();
    info!("counting {k}-mer occurrences over {} reads", reads.n_reads());

    let counters: Vec<AtomicU32> = (0..n).map(|_| AtomicU32::new(0)).collect();
    // id + 1 of the first counter that wrapped; 0 means none.
    let overflowed = AtomicU64::new(0);

    let blob = reads.blob();
    let ranges = partition_ranges(blob.len(), threads);
    debug!("scanning {} worker ranges", ranges.len());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()?;
    pool.scope(|scope| {
        for range in ranges {
            let counters = &counters;
            let overflowed = &overflowed;
            scope.spawn(move |_| {
                scan_range(blob, range, k, |_, canonical, _| {
                    if let Some(id) = resolver.resolve(canonical) {
                        let prev = counters[id as usize].fetch_add(1, Ordering::Relaxed);
                        if prev == u32::MAX {
                            overflowed.store(id + 1, Ordering::Relaxed);
                        }
                    }
                });
            });
        }
    });

    let overflowed = overflowed.load(Ordering::Relaxed);
    if overflowed != 0 {
        let id = overflowed - 1;
        return Err(IndexError::BuildOverflow {
            kmer: resolver.kmer_of(id).unwrap_or_else(|| format!("id {id}")),
        });
    }

    let tf: Vec<u32> = counters.into_iter().map(AtomicU32::into_inner).collect();
    let total: u64 = tf.iter().map(|&v| v as u64).sum();
    info!("counted {total} occurrences over {n} ids");
    Ok(tf)
}

/// Write a tf array as the little-endian `.tf.bin` format.
pub fn write_tf(path: &std::path::Path, tf: &[u32]) -> Result<()> {
    info!("writing {}", path.display());
    crate::builder::atomic_write(path, |writer| crate::builder::write_u32s(writer, tf))
}
