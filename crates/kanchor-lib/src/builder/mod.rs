//! Builders: everything that writes the on-disk index.
//!
//! Three stages, run in isolation from any reader:
//! 1. [`index_build`]: distinct-k-mer list to `.pf` + `.kmers.bin` + `.tf.bin`
//! 2. [`reads_build`]: FASTA/FASTQ to `.reads` + `.ridx` (+ `.header`)
//! 3. [`tf_count`] and [`pos_build`]: reads scans producing `.tf.bin`,
//!    then `.indices.bin` + `.pos.bin`
//!
//! Outputs are written to a temp file in the destination directory and
//! renamed into place on success, so a failed build leaves nothing
//! partial behind.

pub mod config;
pub mod index_build;
pub mod pos_build;
pub mod reads_build;
pub mod tf_count;

use crate::error::Result;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write a file atomically: stream into a temp file in the target's
/// directory, then persist by rename.
pub(crate) fn atomic_write<F>(path: &Path, write_fn: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut std::fs::File>) -> Result<()>,
{
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write_fn(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Stream a u64 array as little-endian bytes.
pub(crate) fn write_u64s<W: Write>(writer: &mut W, values: &[u64]) -> Result<()> {
    for v in values {
        writer.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

/// Stream a u32 array as little-endian bytes.
pub(crate) fn write_u32s<W: Write>(writer: &mut W, values: &[u32]) -> Result<()> {
    for v in values {
        writer.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}
