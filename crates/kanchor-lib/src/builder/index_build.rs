//! Hash-index construction from a distinct-k-mer list.
//!
//! Input is the `<kmer>\t<tf>` text stream produced by any external
//! counter. Records are canonicalized and merged (a k-mer and its
//! reverse complement may both appear), filtered by the tf cutoff, and
//! the MPHF is built over the surviving canonical words. The checker
//! and tf arrays are then arranged in hash-id order and written next to
//! the serialized hash.

use crate::builder::config::BuildOptions;
use crate::builder::{atomic_write, write_u32s, write_u64s};
use crate::codec::{canonical_of, unpack};
use crate::error::{IndexError, Result};
use crate::mphf::{build_mphf, write_pf};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

/// Summary of a hash-index build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashBuildReport {
    /// K-mer length inferred from the input.
    pub k: usize,
    /// Number of distinct canonical k-mers kept.
    pub n: usize,
    /// Sum of kept term frequencies.
    pub total_tf: u64,
    /// Input records dropped (bad alphabet, bad length, bad tf field).
    pub skipped: u64,
}

/// Build `.pf`, `.kmers.bin`, and `.tf.bin` from a `<kmer>\t<tf>` file.
///
/// `k` is inferred from the first valid record; later records of a
/// different length are skipped. Records with tf below
/// `options.cutoff` are dropped after canonical merging.
pub fn build_hash_index(
    tsv_path: &Path,
    pf_out: &Path,
    kmers_out: &Path,
    tf_out: &Path,
    options: &BuildOptions,
) -> Result<HashBuildReport> {
    info!("reading k-mer list from {}", tsv_path.display());
    let (mut entries, k, skipped) = read_kmer_list(tsv_path)?;

    // Merge strand twins: sort by canonical word, then sum runs.
    entries.sort_unstable_by_key(|&(word, _)| word);
    let mut merged: Vec<(u64, u64)> = Vec::with_capacity(entries.len());
    for (word, tf) in entries {
        match merged.last_mut() {
            Some((last, sum)) if *last == word => {
                *sum += tf;
                if *sum > u32::MAX as u64 {
                    return Err(IndexError::BuildOverflow {
                        kmer: unpack(word, k),
                    });
                }
            }
            _ => merged.push((word, tf)),
        }
    }
    if options.cutoff > 0 {
        merged.retain(|&(_, tf)| tf >= options.cutoff as u64);
    }
    if merged.is_empty() {
        return Err(IndexError::InvalidFormat {
            file: tsv_path.to_path_buf(),
            reason: "no k-mer records survived parsing and cutoff".into(),
        });
    }

    let n = merged.len();
    let total_tf: u64 = merged.iter().map(|&(_, tf)| tf).sum();
    info!("building perfect hash over {n} canonical {k}-mers");

    let keys: Vec<u64> = merged.iter().map(|&(word, _)| word).collect();
    let mphf = build_mphf(&keys, options.worker_threads());

    // Arrange checker and tf in hash-id order.
    let mut checker = vec![0u64; n];
    let mut tf_values = vec![0u32; n];
    for (word, tf) in merged {
        let id = mphf.try_hash(&word).ok_or_else(|| {
            IndexError::HashConstruction(format!(
                "key {} missing from its own hash",
                unpack(word, k)
            ))
        })? as usize;
        if id >= n {
            return Err(IndexError::HashConstruction(format!(
                "id {id} out of range for {n} keys"
            )));
        }
        checker[id] = word;
        tf_values[id] = tf as u32;
    }

    info!("writing {}", pf_out.display());
    atomic_write(pf_out, |writer| write_pf(writer, k, n as u64, &mphf))?;
    info!("writing {}", kmers_out.display());
    atomic_write(kmers_out, |writer| write_u64s(writer, &checker))?;
    info!("writing {}", tf_out.display());
    atomic_write(tf_out, |writer| write_u32s(writer, &tf_values))?;

    Ok(HashBuildReport {
        k,
        n,
        total_tf,
        skipped,
    })
}

/// Parse the `<kmer>\t<tf>` stream into canonical `(word, tf)` pairs.
fn read_kmer_list(path: &Path) -> Result<(Vec<(u64, u64)>, usize, u64)> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    let mut k = 0usize;
    let mut skipped = 0u64;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let kmer = fields.next().unwrap_or("");
        let tf: Option<u64> = fields.next().and_then(|f| f.trim().parse().ok());

        // k is fixed by the first record that parses end to end.
        let candidate_k = if k == 0 { kmer.len() } else { k };
        let parsed = if candidate_k > 0
            && candidate_k <= crate::constants::MAX_K
            && kmer.len() == candidate_k
        {
            tf.and_then(|tf| {
                canonical_of(kmer.as_bytes(), candidate_k).map(|(word, _)| (word, tf))
            })
        } else {
            None
        };
        match parsed {
            Some((word, tf)) if tf <= u32::MAX as u64 => {
                if k == 0 {
                    k = candidate_k;
                    info!("inferred k = {k}");
                }
                entries.push((word, tf));
            }
            _ => {
                skipped += 1;
                debug!("line {}: skipped unparsable record", line_no + 1);
            }
        }
    }
    if skipped > 0 {
        warn!("skipped {skipped} unparsable k-mer records");
    }
    Ok((entries, k.max(1), skipped))
}
