//! The concatenated reads blob and its interval table.
//!
//! `.reads` is raw bytes: one read per line, `\n`-terminated. A paired
//! read is two subreads joined by `~`, the second stored
//! reverse-complemented. `.ridx` is an ASCII table of
//! `rid \t start \t end` triples where `end` is the offset of the
//! terminating newline; rids are dense and equal to the row number.
//!
//! The blob is memory-mapped read-only; the interval table is loaded
//! into two flat offset arrays and queried by binary search.

use crate::codec::revcomp_bytes;
use crate::error::{IndexError, Result};
use crate::mapped::TypedMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

/// A read located by an absolute blob offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadView<'a> {
    /// Dense read id (row in the `.ridx` table).
    pub rid: usize,
    /// Byte offset of the read's first base.
    pub start: u64,
    /// Byte offset of the terminating newline.
    pub end: u64,
    /// The read bytes, separator included for paired reads.
    pub bytes: &'a [u8],
}

impl ReadView<'_> {
    /// Offset of `abs` within this read.
    #[inline]
    pub fn local_of(&self, abs: u64) -> usize {
        debug_assert!(abs >= self.start && abs < self.end);
        (abs - self.start) as usize
    }
}

/// One subread yielded by [`ReadsStore::iter_paired_subreads`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subread<'a> {
    /// Owning read id.
    pub rid: usize,
    /// 0 for the first subread, 1 for the second.
    pub index: usize,
    /// Subread bytes, separator excluded.
    pub bytes: &'a [u8],
    /// True for the second subread, which is stored reverse-complemented.
    pub reversed: bool,
}

/// A record from the FASTA `.header` sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    /// Original record identifier.
    pub name: String,
    /// Blob offset where the record's sequence starts.
    pub start: u64,
    /// Sequence length in bytes.
    pub len: u64,
}

/// Memory-mapped reads blob plus the offset→read interval table.
#[derive(Debug)]
pub struct ReadsStore {
    blob: TypedMap<u8>,
    starts: Vec<u64>,
    ends: Vec<u64>,
    headers: Option<Vec<HeaderRecord>>,
}

impl ReadsStore {
    /// Map the blob and load the interval table, checking its
    /// invariants: dense rids, `start < end`, strictly increasing
    /// starts, `end_i < start_{i+1}`, intervals inside the blob.
    pub fn open(reads_path: &Path, ridx_path: &Path) -> Result<Self> {
        let blob = TypedMap::<u8>::open(reads_path)?;
        info!(
            "mapped reads blob {} ({} bytes)",
            reads_path.display(),
            blob.len()
        );

        let mut starts = Vec::new();
        let mut ends = Vec::new();
        let reader = BufReader::new(File::open(ridx_path)?);
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let bad = |reason: String| IndexError::corrupt(ridx_path, reason);
            let mut fields = line.split('\t');
            let rid: usize = fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(|| bad(format!("line {}: unparsable rid", line_no + 1)))?;
            let start: u64 = fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(|| bad(format!("line {}: unparsable start", line_no + 1)))?;
            let end: u64 = fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(|| bad(format!("line {}: unparsable end", line_no + 1)))?;

            if rid != starts.len() {
                return Err(bad(format!(
                    "line {}: rid {rid} breaks dense numbering",
                    line_no + 1
                )));
            }
            if start >= end {
                return Err(bad(format!("line {}: empty interval {start}..{end}", line_no + 1)));
            }
            if let Some(&prev_end) = ends.last() {
                if prev_end >= start {
                    return Err(bad(format!(
                        "line {}: interval start {start} overlaps previous end {prev_end}",
                        line_no + 1
                    )));
                }
            }
            if end > blob.len() as u64 {
                return Err(bad(format!(
                    "line {}: interval end {end} beyond blob of {} bytes",
                    line_no + 1,
                    blob.len()
                )));
            }
            starts.push(start);
            ends.push(end);
        }
        info!("loaded {} read intervals", starts.len());

        Ok(Self {
            blob,
            starts,
            ends,
            headers: None,
        })
    }

    /// Load the FASTA `.header` sidecar (`name \t start \t length`).
    pub fn load_headers(&mut self, path: &Path) -> Result<()> {
        let mut records = Vec::new();
        let reader = BufReader::new(File::open(path)?);
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let mut fields = line.rsplitn(3, '\t');
            let len: u64 = fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(|| {
                    IndexError::corrupt(path, format!("line {}: unparsable length", line_no + 1))
                })?;
            let start: u64 = fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(|| {
                    IndexError::corrupt(path, format!("line {}: unparsable start", line_no + 1))
                })?;
            let name = fields
                .next()
                .ok_or_else(|| {
                    IndexError::corrupt(path, format!("line {}: missing header name", line_no + 1))
                })?
                .to_string();
            records.push(HeaderRecord { name, start, len });
        }
        info!("loaded {} header records from {}", records.len(), path.display());
        self.headers = Some(records);
        Ok(())
    }

    /// Number of reads.
    #[inline]
    pub fn n_reads(&self) -> usize {
        self.starts.len()
    }

    /// The raw blob bytes.
    #[inline]
    pub fn blob(&self) -> &[u8] {
        self.blob.as_slice()
    }

    /// Read bytes by id (separator included for paired reads).
    ///
    /// Panics on an out-of-range rid; use [`ReadsStore::n_reads`] to
    /// bound iteration.
    #[inline]
    pub fn read_by_rid(&self, rid: usize) -> &[u8] {
        let (start, end) = (self.starts[rid] as usize, self.ends[rid] as usize);
        &self.blob.as_slice()[start..end]
    }

    /// Map an absolute blob offset to the read containing it.
    ///
    /// Lower-bound over the start array, then one comparison against
    /// the interval end; offsets that fall on a newline resolve to
    /// `None`.
    pub fn read_of_offset(&self, offset: u64) -> Option<ReadView<'_>> {
        let idx = self.starts.partition_point(|&s| s <= offset);
        if idx == 0 {
            return None;
        }
        let rid = idx - 1;
        if offset >= self.ends[rid] {
            return None;
        }
        Some(ReadView {
            rid,
            start: self.starts[rid],
            end: self.ends[rid],
            bytes: self.read_by_rid(rid),
        })
    }

    /// Read id containing an absolute offset, if any.
    #[inline]
    pub fn rid_of_offset(&self, offset: u64) -> Option<usize> {
        self.read_of_offset(offset).map(|view| view.rid)
    }

    /// Copy an arbitrary byte range of the blob, optionally
    /// reverse-complemented (non-ACGT bytes complement to themselves).
    ///
    /// The range is clamped to the blob.
    pub fn read_slice(&self, start: u64, end: u64, revcomp: bool) -> Vec<u8> {
        let blob = self.blob.as_slice();
        let start = (start as usize).min(blob.len());
        let end = (end as usize).min(blob.len());
        if start >= end {
            return Vec::new();
        }
        let slice = &blob[start..end];
        if revcomp {
            revcomp_bytes(slice)
        } else {
            slice.to_vec()
        }
    }

    /// Header record covering an absolute offset (FASTA sidecar only).
    pub fn header_of_offset(&self, offset: u64) -> Option<&HeaderRecord> {
        let headers = self.headers.as_ref()?;
        let idx = headers.partition_point(|h| h.start <= offset);
        if idx == 0 {
            return None;
        }
        let record = &headers[idx - 1];
        (offset < record.start + record.len).then_some(record)
    }

    /// Lazy iteration over `(rid, read_bytes)`.
    pub fn iter_reads(&self) -> impl Iterator<Item = (usize, &[u8])> {
        (0..self.n_reads()).map(move |rid| (rid, self.read_by_rid(rid)))
    }

    /// Lazy iteration over subreads.
    ///
    /// Paired reads yield both halves in order, the second flagged
    /// [`Subread::reversed`]; single-end reads yield one unflagged
    /// subread.
    pub fn iter_paired_subreads(&self) -> impl Iterator<Item = Subread<'_>> {
        self.iter_reads().flat_map(|(rid, read)| {
            let split = read.iter().position(|&b| b == b'~');
            let (first, second) = match split {
                Some(at) => (&read[..at], Some(&read[at + 1..])),
                None => (read, None),
            };
            std::iter::once(Subread {
                rid,
                index: 0,
                bytes: first,
                reversed: false,
            })
            .chain(second.map(|bytes| Subread {
                rid,
                index: 1,
                bytes,
                reversed: true,
            }))
        })
    }
}
