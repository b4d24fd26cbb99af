//! Minimal perfect hash over the canonical k-mer set.
//!
//! Central module for the MPHF type and its on-disk container, so the
//! rest of the crate never names the underlying implementation. We use
//! boomphf (hypergraph peeling / BBHash family): build over the set of
//! distinct canonical packed words, then `try_hash` at query time.
//! Out-of-set keys may still land on an in-range id, so every lookup
//! must be confirmed against the checker array.
//!
//! # `.pf` container
//!
//! ```text
//! magic            8 bytes  "KANCHPF1"
//! version_major    u32 LE
//! version_minor    u32 LE
//! k                u32 LE
//! n                u64 LE
//! payload          bincode-serialized MPHF
//! ```
//!
//! The 16-byte header makes the file self-describing; the major version
//! is checked strictly on load.

use crate::constants::{DEFAULT_GAMMA, MAX_K, PF_FORMAT_VERSION, PF_MAGIC};
use crate::error::{IndexError, Result};
use std::io::{Read, Write};
use std::path::Path;

/// The MPHF type used throughout the crate.
pub type Mphf = boomphf::Mphf<u64>;

/// Build an MPHF over a set of distinct canonical packed words.
///
/// Keys must be unique; the builder panics inside boomphf otherwise,
/// so callers deduplicate first. Construction parallelizes when more
/// than one thread is requested.
pub fn build_mphf(keys: &[u64], threads: usize) -> Mphf {
    if threads > 1 {
        Mphf::new_parallel(DEFAULT_GAMMA, keys, None)
    } else {
        Mphf::new(DEFAULT_GAMMA, keys)
    }
}

/// Write a `.pf` container: header, `k`, `n`, then the bincode MPHF.
pub fn write_pf<W: Write>(writer: &mut W, k: usize, n: u64, mphf: &Mphf) -> Result<()> {
    writer.write_all(PF_MAGIC)?;
    writer.write_all(&PF_FORMAT_VERSION.0.to_le_bytes())?;
    writer.write_all(&PF_FORMAT_VERSION.1.to_le_bytes())?;
    writer.write_all(&(k as u32).to_le_bytes())?;
    writer.write_all(&n.to_le_bytes())?;
    bincode::serialize_into(writer, mphf)?;
    Ok(())
}

/// Read a `.pf` container, returning `(k, n, mphf)`.
///
/// `path` is used only for error context.
pub fn read_pf<R: Read>(reader: &mut R, path: &Path) -> Result<(usize, u64, Mphf)> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != PF_MAGIC {
        return Err(IndexError::InvalidFormat {
            file: path.to_path_buf(),
            reason: "bad magic, not a perfect-hash container".into(),
        });
    }

    let mut word = [0u8; 4];
    reader.read_exact(&mut word)?;
    let major = u32::from_le_bytes(word);
    reader.read_exact(&mut word)?;
    let minor = u32::from_le_bytes(word);
    if major != PF_FORMAT_VERSION.0 {
        return Err(IndexError::InvalidFormat {
            file: path.to_path_buf(),
            reason: format!(
                "version {major}.{minor} is incompatible with {}.{}",
                PF_FORMAT_VERSION.0, PF_FORMAT_VERSION.1
            ),
        });
    }

    reader.read_exact(&mut word)?;
    let k = u32::from_le_bytes(word) as usize;
    let mut long = [0u8; 8];
    reader.read_exact(&mut long)?;
    let n = u64::from_le_bytes(long);
    if k == 0 || k > MAX_K {
        return Err(IndexError::InvalidFormat {
            file: path.to_path_buf(),
            reason: format!("k = {k} out of range 1..={MAX_K}"),
        });
    }

    let mphf: Mphf = bincode::deserialize_from(reader)?;
    Ok((k, n, mphf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{canonical_of, pack};
    use std::collections::HashSet;

    fn sample_keys() -> Vec<u64> {
        let seqs: [&[u8]; 5] = [
            b"GATTACAGATTACAGATTACAGA",
            b"AAAAAAAAAAAAAAAAAAAAAAA",
            b"ACGTACGTACGTACGTACGTACG",
            b"CCCCCCCCCCCCCCCCCCCCCCC",
            b"ACACACACACACACACACACACA",
        ];
        seqs.iter()
            .map(|s| canonical_of(s, 23).unwrap().0)
            .collect()
    }

    #[test]
    fn test_mphf_is_minimal_and_perfect() {
        let keys = sample_keys();
        let mphf = build_mphf(&keys, 1);

        let ids: HashSet<u64> = keys.iter().map(|k| mphf.try_hash(k).unwrap()).collect();
        assert_eq!(ids.len(), keys.len());
        assert!(ids.iter().all(|&id| id < keys.len() as u64));
    }

    #[test]
    fn test_pf_roundtrip() {
        let keys = sample_keys();
        let mphf = build_mphf(&keys, 1);

        let mut buf = Vec::new();
        write_pf(&mut buf, 23, keys.len() as u64, &mphf).unwrap();

        let (k, n, restored) = read_pf(&mut buf.as_slice(), Path::new("test.pf")).unwrap();
        assert_eq!(k, 23);
        assert_eq!(n, keys.len() as u64);
        for key in &keys {
            assert_eq!(restored.try_hash(key), mphf.try_hash(key));
        }
    }

    #[test]
    fn test_pf_rejects_bad_magic() {
        let mut buf = b"NOTMAGIC".to_vec();
        buf.extend_from_slice(&[0u8; 8]);
        let err = read_pf(&mut buf.as_slice(), Path::new("bad.pf")).unwrap_err();
        assert!(matches!(err, IndexError::InvalidFormat { .. }));
    }

    #[test]
    fn test_pf_rejects_future_major_version() {
        let keys = vec![pack(b"ACGT", 4).unwrap()];
        let mphf = build_mphf(&keys, 1);
        let mut buf = Vec::new();
        write_pf(&mut buf, 4, 1, &mphf).unwrap();
        // Bump the major version field in place.
        buf[8] = 99;
        let err = read_pf(&mut buf.as_slice(), Path::new("future.pf")).unwrap_err();
        assert!(matches!(err, IndexError::InvalidFormat { .. }));
    }
}
