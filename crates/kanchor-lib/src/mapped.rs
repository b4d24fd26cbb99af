//! Read-only memory maps with typed views.
//!
//! All on-disk arrays (`.kmers.bin`, `.tf.bin`, `.indices.bin`,
//! `.pos.bin`, the reads blob) are mapped read-only and exposed as
//! immutable slices. Element width and length are validated once at
//! open time, so the slice accessors cannot fail afterwards. The map is
//! released when the value drops, on every exit path.

use crate::error::{IndexError, Result};
use bytemuck::Pod;
use memmap2::Mmap;
use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Backing storage for a mapped region. Zero-length files cannot be
/// mapped on all platforms, so they get their own variant.
#[derive(Debug)]
enum Buffer {
    Empty,
    Mapped(Mmap),
}

impl Buffer {
    #[inline]
    fn bytes(&self) -> &[u8] {
        match self {
            Buffer::Empty => &[],
            Buffer::Mapped(mmap) => mmap.as_ref(),
        }
    }
}

/// A read-only file mapping viewed as a slice of `T`.
#[derive(Debug)]
pub struct TypedMap<T: Pod> {
    buf: Buffer,
    path: PathBuf,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> TypedMap<T> {
    /// Map `path` read-only and validate that its size is a whole
    /// number of `T` elements.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let meta = file.metadata()?;
        let buf = if meta.len() == 0 {
            Buffer::Empty
        } else {
            // Safety: the file is opened read-only and never truncated
            // by this process while mapped.
            Buffer::Mapped(unsafe { Mmap::map(&file)? })
        };

        let elem = std::mem::size_of::<T>();
        let n_bytes = buf.bytes().len();
        if n_bytes % elem != 0 {
            return Err(IndexError::corrupt(
                path,
                format!("size {n_bytes} is not a multiple of element size {elem}"),
            ));
        }
        // The mapping is page-aligned, which satisfies any primitive T;
        // verify anyway so a bad cast is impossible later.
        if n_bytes > 0 && bytemuck::try_cast_slice::<u8, T>(buf.bytes()).is_err() {
            return Err(IndexError::corrupt(path, "misaligned mapping"));
        }

        Ok(Self {
            buf,
            path: path.to_path_buf(),
            len: n_bytes / elem,
            _marker: PhantomData,
        })
    }

    /// The mapped elements.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        let bytes = self.buf.bytes();
        if bytes.is_empty() {
            &[]
        } else {
            bytemuck::cast_slice(bytes)
        }
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the mapping is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The file this mapping came from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fail with `CorruptIndex` unless the mapping holds exactly
    /// `expected` elements.
    pub fn expect_len(&self, expected: usize, what: &str) -> Result<()> {
        if self.len != expected {
            return Err(IndexError::corrupt(
                &self.path,
                format!("{what}: expected {expected} entries, found {}", self.len),
            ));
        }
        Ok(())
    }
}
