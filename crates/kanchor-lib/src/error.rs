//! Error types for index construction and loading.
//!
//! Query-time anomalies (unknown k-mer, wrong length, non-ACGT input) are
//! not errors: queries return neutral values (zero, empty, `NotFound`).
//! Everything here is fatal at build or load time.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by builders and loaders.
#[derive(Error, Debug)]
pub enum IndexError {
    /// I/O failure while opening, reading, or mapping a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An on-disk structure failed a consistency check.
    #[error("corrupt index file {file:?}: {reason}")]
    CorruptIndex {
        /// The offending file.
        file: PathBuf,
        /// What the check found.
        reason: String,
    },

    /// A serialized container has the wrong magic or an incompatible version.
    #[error("invalid format in {file:?}: {reason}")]
    InvalidFormat {
        /// The offending file.
        file: PathBuf,
        /// What was expected.
        reason: String,
    },

    /// A term-frequency counter would exceed `u32::MAX`.
    #[error("term frequency overflow for k-mer {kmer}: counts exceed u32::MAX")]
    BuildOverflow {
        /// The k-mer whose counter overflowed (decoded).
        kmer: String,
    },

    /// The perfect hash failed to place a key from its own build set.
    #[error("hash construction error: {0}")]
    HashConstruction(String),

    /// MPHF payload (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Worker pool creation failure.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl IndexError {
    /// Shorthand for a [`IndexError::CorruptIndex`] with formatted context.
    pub fn corrupt(file: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        IndexError::CorruptIndex {
            file: file.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, IndexError>;
