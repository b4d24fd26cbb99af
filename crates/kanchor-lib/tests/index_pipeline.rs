//! End-to-end tests over the full build pipeline: reads conversion,
//! hash build, tf counting, positional build, then queries through the
//! engine. Position lists are order-unspecified, so assertions sort
//! before comparing.

use kanchor_lib::builder::config::BuildOptions;
use kanchor_lib::builder::index_build::build_hash_index;
use kanchor_lib::builder::pos_build::{build_positions, write_position_files};
use kanchor_lib::builder::tf_count::{count_tf, write_tf};
use kanchor_lib::codec::{canonical_of, revcomp_bytes, unpack, CanonicalWindows};
use kanchor_lib::{IndexError, IndexPaths, KmerResolver, MphfResolver, QueryEngine, Strand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write a reads blob + ridx table for plain read lines.
fn write_reads(dir: &Path, reads: &[String]) -> (PathBuf, PathBuf) {
    let reads_path = dir.join("corpus.reads");
    let ridx_path = dir.join("corpus.ridx");
    let mut reads_file = std::fs::File::create(&reads_path).unwrap();
    let mut ridx_file = std::fs::File::create(&ridx_path).unwrap();
    let mut start = 0u64;
    for (rid, read) in reads.iter().enumerate() {
        writeln!(reads_file, "{read}").unwrap();
        let end = start + read.len() as u64;
        writeln!(ridx_file, "{rid}\t{start}\t{end}").unwrap();
        start = end + 1;
    }
    (reads_path, ridx_path)
}

/// Enumerate the corpus's distinct canonical k-mers as a counter would.
fn corpus_kmer_list(reads: &[String], k: usize) -> Vec<(String, u32)> {
    let mut counts: HashMap<u64, u32> = HashMap::new();
    for read in reads {
        for (_, canonical, _) in CanonicalWindows::new(read.as_bytes(), k) {
            *counts.entry(canonical).or_insert(0) += 1;
        }
    }
    let mut list: Vec<(String, u32)> = counts
        .into_iter()
        .map(|(word, tf)| (unpack(word, k), tf))
        .collect();
    list.sort();
    list
}

/// Run the whole pipeline and open an engine over the result.
fn build_engine(dir: &Path, reads: &[String], k: usize) -> QueryEngine {
    let (reads_path, ridx_path) = write_reads(dir, reads);

    let tsv_path = dir.join("kmers.tsv");
    let mut tsv = std::fs::File::create(&tsv_path).unwrap();
    for (kmer, tf) in corpus_kmer_list(reads, k) {
        writeln!(tsv, "{kmer}\t{tf}").unwrap();
    }
    drop(tsv);

    let paths = IndexPaths::new(dir.join("idx"));
    let options = BuildOptions {
        k,
        threads: 2,
        ..BuildOptions::default()
    };
    build_hash_index(&tsv_path, &paths.pf(), &paths.kmers(), &paths.tf(), &options).unwrap();

    let store = kanchor_lib::ReadsStore::open(&reads_path, &ridx_path).unwrap();
    let resolver = KmerResolver::Mphf(MphfResolver::open(&paths.pf(), &paths.kmers()).unwrap());
    let tf = count_tf(&store, &resolver, 2).unwrap();
    write_tf(&paths.tf(), &tf).unwrap();
    let (indices, positions, _) = build_positions(&store, &resolver, &tf, 0, 2).unwrap();
    write_position_files(&paths, &indices, &positions, 0).unwrap();

    QueryEngine::open(&paths, &reads_path, &ridx_path, false, 0).unwrap()
}

fn sorted(mut values: Vec<u64>) -> Vec<u64> {
    values.sort_unstable();
    values
}

#[test]
fn scenario_same_canonical_across_strands() {
    // Two reads, one k-mer each, sharing a canonical form: the second
    // read is the reverse complement of the first.
    let dir = tempfile::tempdir().unwrap();
    let reads = vec![
        "CACACACACACACACACACACAC".to_string(),
        "GTGTGTGTGTGTGTGTGTGTGTG".to_string(),
    ];
    let engine = build_engine(dir.path(), &reads, 23);

    assert_eq!(engine.n(), 1);
    assert_eq!(engine.tf(reads[0].as_bytes()), 2);
    assert_eq!(engine.tf(reads[1].as_bytes()), 2);
    // Both occurrences sit at the read starts.
    assert_eq!(sorted(engine.positions(reads[0].as_bytes())), vec![0, 24]);
    assert_eq!(
        sorted(engine.positions(reads[1].as_bytes())),
        sorted(engine.positions(reads[0].as_bytes()))
    );
}

#[test]
fn scenario_homopolymer_strands() {
    let dir = tempfile::tempdir().unwrap();
    let reads = vec![
        "AAAAAAAAAAAAAAAAAAAAAAA".to_string(),
        "AAAAAAAAAAAAAAAAAAAAAAA".to_string(),
    ];
    let engine = build_engine(dir.path(), &reads, 23);

    assert_eq!(engine.n(), 1);
    assert_eq!(engine.tf(b"AAAAAAAAAAAAAAAAAAAAAAA"), 2);
    assert_eq!(engine.strand(b"AAAAAAAAAAAAAAAAAAAAAAA"), Strand::Forward);
    assert_eq!(engine.strand(b"TTTTTTTTTTTTTTTTTTTTTTT"), Strand::Reverse);
    assert_eq!(engine.strand(b"GGGGGGGGGGGGGGGGGGGGGGG"), Strand::NotFound);
}

#[test]
fn scenario_random_corpus_properties() {
    let mut rng = StdRng::seed_from_u64(42);
    let bases = [b'A', b'C', b'G', b'T'];
    let reads: Vec<String> = (0..100)
        .map(|_| {
            (0..100)
                .map(|_| bases[rng.gen_range(0..4)] as char)
                .collect()
        })
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let k = 23;
    let engine = build_engine(dir.path(), &reads, k);
    let blob_reads = &reads;

    // Ten random k-mers present in the input.
    for _ in 0..10 {
        let rid = rng.gen_range(0..blob_reads.len());
        let at = rng.gen_range(0..blob_reads[rid].len() - k + 1);
        let kmer = &blob_reads[rid].as_bytes()[at..at + k];

        let positions = engine.positions(kmer);
        assert_eq!(positions.len() as u32, engine.tf(kmer), "kmer {:?}", kmer);
        assert!(!positions.is_empty());

        // Canonical symmetry: the reverse complement answers the same.
        let rc = revcomp_bytes(kmer);
        assert_eq!(engine.tf(&rc), engine.tf(kmer));
        assert_eq!(sorted(engine.positions(&rc)), sorted(positions.clone()));

        // Every position decodes to the k-mer modulo reverse complement.
        let (queried_canonical, _) = canonical_of(kmer, k).unwrap();
        for offset in positions {
            let view = engine.read_of_offset(offset).unwrap();
            let local = view.local_of(offset);
            let window = &view.bytes[local..local + k];
            let (stored_canonical, _) = canonical_of(window, k).unwrap();
            assert_eq!(stored_canonical, queried_canonical);
        }
    }

    // Checker soundness over the whole id space.
    for id in 0..engine.n() as u64 {
        let kmer = engine.kmer_of(id).unwrap();
        assert_eq!(engine.id(kmer.as_bytes()), Some(id));
    }
}

#[test]
fn scenario_paired_subreads() {
    let dir = tempfile::tempdir().unwrap();
    let reads = vec!["AAAAC~GTTTT".to_string()];
    let engine = build_engine(dir.path(), &reads, 5);

    let subreads: Vec<_> = engine.iter_paired_subreads().collect();
    assert_eq!(subreads.len(), 2);
    assert_eq!(subreads[0].bytes, b"AAAAC");
    assert_eq!(subreads[0].index, 0);
    assert!(!subreads[0].reversed);
    assert_eq!(subreads[1].bytes, b"GTTTT");
    assert_eq!(subreads[1].index, 1);
    assert!(subreads[1].reversed);

    // No window spans the separator: AAAAC and GTTTT share a canonical
    // form, so the single id holds both subread hits and nothing else.
    assert_eq!(engine.tf(b"AAAAC"), 2);
    assert_eq!(sorted(engine.positions(b"AAAAC")), vec![0, 6]);
    assert_eq!(engine.tf(b"AAACG"), 0);
}

#[test]
fn scenario_truncated_positions_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let reads = vec![
        "CACACACACACACACACACACAC".to_string(),
        "GTGTGTGTGTGTGTGTGTGTGTG".to_string(),
    ];
    // Build once to lay the files down.
    let engine = build_engine(dir.path(), &reads, 23);
    assert_eq!(engine.n(), 1);
    drop(engine);
    let reads_path = dir.path().join("corpus.reads");
    let ridx_path = dir.path().join("corpus.ridx");

    // Truncate .pos.bin by one entry.
    let paths = IndexPaths::new(dir.path().join("idx"));
    let pos_path = paths.positions();
    let bytes = std::fs::read(&pos_path).unwrap();
    std::fs::write(&pos_path, &bytes[..bytes.len() - 8]).unwrap();

    let err = QueryEngine::open(&paths, &reads_path, &ridx_path, false, 0).unwrap_err();
    assert!(matches!(err, IndexError::CorruptIndex { .. }));
}

#[test]
fn kmer_to_reads_classifies_strands() {
    let dir = tempfile::tempdir().unwrap();
    let reads = vec![
        "CACACACACACACACACACACAC".to_string(),
        "GTGTGTGTGTGTGTGTGTGTGTG".to_string(),
    ];
    let engine = build_engine(dir.path(), &reads, 23);

    let hits = engine.kmer_to_reads(reads[0].as_bytes(), 10);
    assert_eq!(hits.len(), 2);
    let by_rid: HashMap<usize, &kanchor_lib::KmerHit> =
        hits.iter().map(|h| (h.rid, h)).collect();
    assert_eq!(by_rid[&0].strand, Strand::Forward);
    assert_eq!(by_rid[&0].offset, 0);
    assert_eq!(by_rid[&1].strand, Strand::Reverse);
    assert_eq!(by_rid[&1].read, reads[1].as_bytes());

    // The cap bounds distinct reads.
    assert_eq!(engine.kmer_to_reads(reads[0].as_bytes(), 1).len(), 1);
    // Unknown k-mers yield nothing.
    assert!(engine.kmer_to_reads(b"GGGGGGGGGGGGGGGGGGGGGGG", 10).is_empty());
}

#[test]
fn rid_to_local_positions_groups_hits() {
    let dir = tempfile::tempdir().unwrap();
    let reads = vec!["GATTAGATTAGATTA".to_string(), "GATTA".to_string()];
    let engine = build_engine(dir.path(), &reads, 5);

    let mut hits = engine.rid_to_local_positions(b"GATTA");
    for locals in hits.values_mut() {
        locals.sort_unstable();
    }
    assert_eq!(hits[&0], vec![0, 5, 10]);
    assert_eq!(hits[&1], vec![0]);
}

#[test]
fn frequency_iteration_is_descending() {
    let dir = tempfile::tempdir().unwrap();
    let reads = vec![
        "GATTAGATTAGATTA".to_string(),
        "GATTAGATTA".to_string(),
        "CCCGG".to_string(),
    ];
    let engine = build_engine(dir.path(), &reads, 5);

    let ranked: Vec<(String, u32)> = engine.iter_by_frequency(1, 10).collect();
    assert!(!ranked.is_empty());
    for pair in ranked.windows(2) {
        assert!(pair[0].1 >= pair[1].1);
    }
    // GATTA dominates the corpus.
    let canonical_gatta = unpack(canonical_of(b"GATTA", 5).unwrap().0, 5);
    assert_eq!(ranked[0].0, canonical_gatta);
    assert_eq!(ranked[0].1, 5);

    // min_tf filters, max_count caps.
    assert!(engine.iter_by_frequency(5, 10).count() == 1);
    assert!(engine.iter_by_frequency(1, 2).count() == 2);
}

#[test]
fn sequence_coverage_profile() {
    let dir = tempfile::tempdir().unwrap();
    let reads = vec!["GATTAGATTA".to_string()];
    let engine = build_engine(dir.path(), &reads, 5);

    let coverage = engine.sequence_coverage(b"GATTAG", 0);
    assert_eq!(coverage.len(), 2);
    assert_eq!(coverage[0], 2); // GATTA occurs twice
    assert_eq!(coverage[1], 1); // ATTAG occurs once

    // Windows with invalid bases read zero.
    let coverage = engine.sequence_coverage(b"GATTN", 0);
    assert_eq!(coverage, vec![0]);
}
