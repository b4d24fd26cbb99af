//! Conversion of FASTA/FASTQ input into the reads blob.
//!
//! Output is the `.reads` byte blob (one read per line) plus the
//! `.ridx` interval table, and a `.header` sidecar for FASTA input.
//! Paired-end mode writes `sub1 ~ revcomp(sub2)` per line; storing the
//! second mate reverse-complemented is what makes strand recovery work
//! at query time, so the convention is load-bearing.

use crate::builder::atomic_write;
use crate::codec::revcomp_bytes;
use crate::error::{IndexError, Result};
use crate::files::{header_for, ridx_for};
use needletail::parse_fastx_file;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Input layout accepted by the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadsFormat {
    /// Two FASTQ files, mates in lockstep.
    Fastq,
    /// One FASTA file; records keep their headers in the sidecar.
    Fasta,
    /// One single-end file (FASTA or FASTQ).
    SingleEnd,
}

impl FromStr for ReadsFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fastq" => Ok(ReadsFormat::Fastq),
            "fasta" => Ok(ReadsFormat::Fasta),
            "se" => Ok(ReadsFormat::SingleEnd),
            other => Err(format!("unknown reads format {other:?} (expected fastq|fasta|se)")),
        }
    }
}

/// Summary of a reads conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadsBuildReport {
    /// Reads (pairs count once) written to the blob.
    pub n_reads: usize,
    /// Total blob size in bytes.
    pub bytes: u64,
}

/// One record pulled from a fastx file.
struct PlainRecord {
    name: Vec<u8>,
    seq: Vec<u8>,
}

fn read_records(path: &Path) -> Result<Vec<PlainRecord>> {
    let mut reader = parse_fastx_file(path).map_err(|e| IndexError::InvalidFormat {
        file: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut records = Vec::new();
    while let Some(record) = reader.next() {
        let record = record.map_err(|e| IndexError::InvalidFormat {
            file: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        records.push(PlainRecord {
            name: record.id().to_vec(),
            seq: record.seq().into_owned(),
        });
    }
    Ok(records)
}

/// Convert input reads into `.reads` + `.ridx` (+ `.header` for FASTA).
///
/// `in2` is required for [`ReadsFormat::Fastq`] and ignored otherwise.
pub fn convert_reads(
    in1: &Path,
    in2: Option<&Path>,
    format: ReadsFormat,
    out: &Path,
) -> Result<ReadsBuildReport> {
    info!("converting reads from {}", in1.display());

    // Each output line: (read bytes, optional original header).
    let mut lines: Vec<(Vec<u8>, Option<Vec<u8>>)> = Vec::new();
    match format {
        ReadsFormat::Fastq => {
            let second = in2.ok_or_else(|| IndexError::InvalidFormat {
                file: in1.to_path_buf(),
                reason: "paired fastq conversion needs a second input file".into(),
            })?;
            let mates1 = read_records(in1)?;
            let mates2 = read_records(second)?;
            if mates1.len() != mates2.len() {
                return Err(IndexError::InvalidFormat {
                    file: second.to_path_buf(),
                    reason: format!(
                        "paired inputs differ in record count: {} vs {}",
                        mates1.len(),
                        mates2.len()
                    ),
                });
            }
            for (r1, r2) in mates1.into_iter().zip(mates2) {
                let mut line = r1.seq;
                line.push(b'~');
                line.extend_from_slice(&revcomp_bytes(&r2.seq));
                lines.push((line, None));
            }
        }
        ReadsFormat::SingleEnd => {
            for record in read_records(in1)? {
                lines.push((record.seq, None));
            }
        }
        ReadsFormat::Fasta => {
            for record in read_records(in1)? {
                lines.push((record.seq, Some(record.name)));
            }
        }
    }

    let mut bytes = 0u64;
    atomic_write(out, |writer| {
        for (line, _) in &lines {
            writer.write_all(line)?;
            writer.write_all(b"\n")?;
            bytes += line.len() as u64 + 1;
        }
        Ok(())
    })?;

    let ridx_path = ridx_for(out);
    atomic_write(&ridx_path, |writer| {
        let mut start = 0u64;
        for (rid, (line, _)) in lines.iter().enumerate() {
            let end = start + line.len() as u64;
            writeln!(writer, "{rid}\t{start}\t{end}")?;
            start = end + 1;
        }
        Ok(())
    })?;

    if format == ReadsFormat::Fasta {
        let header_path = header_for(out);
        atomic_write(&header_path, |writer| {
            let mut start = 0u64;
            for (line, name) in &lines {
                if let Some(name) = name {
                    writer.write_all(name)?;
                    writeln!(writer, "\t{start}\t{}", line.len())?;
                }
                start += line.len() as u64 + 1;
            }
            Ok(())
        })?;
    }

    info!("wrote {} reads ({} bytes) to {}", lines.len(), bytes, out.display());
    Ok(ReadsBuildReport {
        n_reads: lines.len(),
        bytes,
    })
}
