//! Two-phase construction of the positional index.
//!
//! Phase 1 turns the tf array into its exclusive prefix sum
//! (`indices`, N+1 entries) and allocates the zeroed positions array
//! plus one write cursor per id, initialized to `indices[id]`.
//!
//! Phase 2 repeats the parallel reads scan: each occurrence reserves a
//! slot with an acquire-release `fetch_add` on its id's cursor and
//! stores the 1-based blob offset, so every slot is written exactly
//! once. With a cap in effect, occurrences past the cap skip the store
//! and the reserved slots stay zero; tf itself is left unchanged
//! (policy recorded in the `.pos.meta` sidecar).

use crate::builder::tf_count::{partition_ranges, scan_range};
use crate::builder::{atomic_write, write_u64s};
use crate::error::Result;
use crate::files::IndexPaths;
use crate::hash_index::KmerResolver;
use crate::reads::ReadsStore;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Summary of a positional build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PosBuildReport {
    /// Total slots allocated (Σ tf).
    pub total_slots: u64,
    /// Slots actually filled (Σ min(tf, cap)).
    pub filled: u64,
    /// Ids whose tf exceeds the cap.
    pub capped_ids: u64,
}

/// Build the `indices` and `positions` arrays in memory.
///
/// `tf` must be the counts produced by
/// [`count_tf`](crate::builder::tf_count::count_tf) with the same
/// resolver over the same reads store. `max_tf == 0` means uncapped.
pub fn build_positions(
    reads: &ReadsStore,
    resolver: &KmerResolver,
    tf: &[u32],
    max_tf: u32,
    threads: usize,
) -> Result<(Vec<u64>, Vec<u64>, PosBuildReport)> {
    let n = resolver.n();
    assert_eq!(tf.len(), n, "tf array does not match the resolver's id space");

    // Phase 1: exclusive prefix sum and cursors.
    let mut indices = Vec::with_capacity(n + 1);
    let mut running = 0u64;
    indices.push(0);
    for &count in tf {
        running += count as u64;
        indices.push(running);
    }
    let total_slots = running;
    info!("allocating positions array of {total_slots} slots");

    let positions: Vec<AtomicU64> = (0..total_slots).map(|_| AtomicU64::new(0)).collect();
    let cursors: Vec<AtomicU64> = indices[..n].iter().map(|&at| AtomicU64::new(at)).collect();
    let cap = if max_tf == 0 { u64::MAX } else { max_tf as u64 };

    // Phase 2: parallel fill.
    let blob = reads.blob();
    let k = resolver.k();
    let ranges = partition_ranges(blob.len(), threads);
    debug!("filling positions over {} worker ranges", ranges.len());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()?;
    pool.scope(|scope| {
        for range in ranges {
            let positions = &positions;
            let cursors = &cursors;
            let indices = &indices;
            scope.spawn(move |_| {
                scan_range(blob, range, k, |offset, canonical, _| {
                    if let Some(id) = resolver.resolve(canonical) {
                        let id = id as usize;
                        let slot = cursors[id].fetch_add(1, Ordering::AcqRel);
                        // Slots past the cap (or past a stale tf) stay zero.
                        if slot - indices[id] < cap && slot < indices[id + 1] {
                            positions[slot as usize].store(offset + 1, Ordering::Release);
                        }
                    }
                });
            });
        }
    });

    let positions: Vec<u64> = positions.into_iter().map(AtomicU64::into_inner).collect();
    let mut filled = 0u64;
    let mut capped_ids = 0u64;
    for &count in tf {
        let count = count as u64;
        filled += count.min(cap);
        if count > cap {
            capped_ids += 1;
        }
    }
    info!("filled {filled}/{total_slots} slots ({capped_ids} capped ids)");

    Ok((
        indices,
        positions,
        PosBuildReport {
            total_slots,
            filled,
            capped_ids,
        },
    ))
}

/// Write `.indices.bin`, `.pos.bin`, and the `.pos.meta` sidecar.
pub fn write_position_files(
    paths: &IndexPaths,
    indices: &[u64],
    positions: &[u64],
    max_tf: u32,
) -> Result<()> {
    let indices_path = paths.indices();
    info!("writing {}", indices_path.display());
    atomic_write(&indices_path, |writer| write_u64s(writer, indices))?;

    let positions_path = paths.positions();
    info!("writing {}", positions_path.display());
    atomic_write(&positions_path, |writer| write_u64s(writer, positions))?;

    atomic_write(&paths.pos_meta(), |writer| {
        writeln!(writer, "max_tf={max_tf}")?;
        writeln!(writer, "cap_policy=zero-pad")?;
        Ok(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::config::BuildOptions;
    use crate::builder::index_build::build_hash_index;
    use crate::builder::tf_count::count_tf;
    use crate::codec::canonical_of;
    use crate::hash_index::MphfResolver;

    fn fixture(
        lines: &[&str],
        kmers: &[&str],
    ) -> (tempfile::TempDir, ReadsStore, KmerResolver) {
        let dir = tempfile::tempdir().unwrap();
        let reads_path = dir.path().join("corpus.reads");
        let ridx_path = dir.path().join("corpus.ridx");
        let mut reads_file = std::fs::File::create(&reads_path).unwrap();
        let mut ridx_file = std::fs::File::create(&ridx_path).unwrap();
        let mut start = 0u64;
        for (rid, line) in lines.iter().enumerate() {
            writeln!(reads_file, "{line}").unwrap();
            let end = start + line.len() as u64;
            writeln!(ridx_file, "{rid}\t{start}\t{end}").unwrap();
            start = end + 1;
        }
        drop(reads_file);
        drop(ridx_file);

        let tsv_path = dir.path().join("kmers.tsv");
        let mut tsv = std::fs::File::create(&tsv_path).unwrap();
        for kmer in kmers {
            writeln!(tsv, "{kmer}\t1").unwrap();
        }
        drop(tsv);
        let (pf, checker, tf) = (
            dir.path().join("idx.pf"),
            dir.path().join("idx.kmers.bin"),
            dir.path().join("idx.tf.bin"),
        );
        build_hash_index(&tsv_path, &pf, &checker, &tf, &BuildOptions::default()).unwrap();

        let store = ReadsStore::open(&reads_path, &ridx_path).unwrap();
        let resolver = KmerResolver::Mphf(MphfResolver::open(&pf, &checker).unwrap());
        (dir, store, resolver)
    }

    #[test]
    fn test_prefix_sum_and_fill() {
        let (_dir, store, resolver) = fixture(&["GATTAGATTA", "TAATC"], &["GATTA", "ATTAG"]);
        let tf = count_tf(&store, &resolver, 1).unwrap();
        let (indices, positions, report) =
            build_positions(&store, &resolver, &tf, 0, 2).unwrap();

        // Prefix-sum consistency.
        assert_eq!(indices.len(), resolver.n() + 1);
        assert_eq!(indices[0], 0);
        for (i, &count) in tf.iter().enumerate() {
            assert_eq!(indices[i + 1] - indices[i], count as u64);
        }
        assert_eq!(*indices.last().unwrap(), positions.len() as u64);
        assert_eq!(report.total_slots, positions.len() as u64);
        assert_eq!(report.filled, positions.len() as u64);

        // Every slot holds a 1-based offset whose window decodes to the
        // id's canonical k-mer, fully inside one read.
        let blob = store.blob();
        for id in 0..resolver.n() {
            for &stored in &positions[indices[id] as usize..indices[id + 1] as usize] {
                assert_ne!(stored, 0);
                let offset = (stored - 1) as usize;
                let window = &blob[offset..offset + 5];
                assert!(!window.contains(&b'\n') && !window.contains(&b'~'));
                let (canonical, _) = canonical_of(window, 5).unwrap();
                assert_eq!(resolver.resolve(canonical), Some(id as u64));
            }
        }
    }

    #[test]
    fn test_fill_counts_match_tf() {
        let (_dir, store, resolver) =
            fixture(&["GATTAGATTAGATTA", "GATTA"], &["GATTA", "AAAAA"]);
        let tf = count_tf(&store, &resolver, 1).unwrap();
        let (indices, positions, _) = build_positions(&store, &resolver, &tf, 0, 1).unwrap();

        for (id, &count) in tf.iter().enumerate() {
            let nonzero = positions[indices[id] as usize..indices[id + 1] as usize]
                .iter()
                .filter(|&&p| p != 0)
                .count();
            assert_eq!(nonzero as u32, count);
        }
    }

    #[test]
    fn test_cap_zero_pads() {
        let (_dir, store, resolver) =
            fixture(&["GATTAGATTAGATTAGATTA"], &["GATTA"]);
        let tf = count_tf(&store, &resolver, 1).unwrap();
        // GATTA occurs at offsets 0, 5, 10, 15.
        let gatta_id = resolver
            .resolve(canonical_of(b"GATTA", 5).unwrap().0)
            .unwrap() as usize;
        assert_eq!(tf[gatta_id], 4);

        let (indices, positions, report) =
            build_positions(&store, &resolver, &tf, 2, 1).unwrap();
        // Slots are still allocated for the full tf, zero-padded past the cap.
        assert_eq!(indices[gatta_id + 1] - indices[gatta_id], 4);
        let slice = &positions[indices[gatta_id] as usize..indices[gatta_id + 1] as usize];
        assert_eq!(slice.iter().filter(|&&p| p != 0).count(), 2);
        assert_eq!(report.capped_ids, 1);
        assert_eq!(report.filled, 2);
    }

    #[test]
    fn test_write_position_files() {
        let (dir, store, resolver) = fixture(&["GATTA"], &["GATTA"]);
        let tf = count_tf(&store, &resolver, 1).unwrap();
        let (indices, positions, _) = build_positions(&store, &resolver, &tf, 0, 1).unwrap();

        let paths = IndexPaths::new(dir.path().join("out"));
        write_position_files(&paths, &indices, &positions, 0).unwrap();

        let indices_bytes = std::fs::read(paths.indices()).unwrap();
        assert_eq!(indices_bytes.len(), indices.len() * 8);
        let positions_bytes = std::fs::read(paths.positions()).unwrap();
        assert_eq!(positions_bytes.len(), positions.len() * 8);
        let meta = std::fs::read_to_string(paths.pos_meta()).unwrap();
        assert!(meta.contains("max_tf=0"));
        assert!(meta.contains("cap_policy=zero-pad"));
    }
}
