// kanchor: positional k-mer index over short-read corpora
//
// Answers "how often does this k-mer occur" and "where exactly does it
// occur" over a disk-resident, memory-mapped index, identifying every
// k-mer with its reverse complement.

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod builder;
pub mod codec;
pub mod constants;
pub mod error;
pub mod files;
pub mod hash_index;
pub mod mapped;
pub mod mphf;
pub mod query;
pub mod reads;

// Re-export common types at crate root
pub use builder::config::BuildOptions;
pub use codec::{CanonicalWindows, Strand};
pub use error::{IndexError, Result};
pub use files::IndexPaths;
pub use hash_index::{KmerIndex, KmerResolver, MphfResolver};
pub use query::{KmerHit, QueryEngine};
pub use reads::{ReadView, ReadsStore, Subread};

/// Version information
pub fn version() -> (u8, u8, u8) {
    constants::VERSION
}
