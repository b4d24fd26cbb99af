//! Path conventions for the on-disk index family.
//!
//! Every artifact hangs off a shared prefix: `<prefix>.pf`,
//! `<prefix>.kmers.bin`, `<prefix>.tf.bin`, `<prefix>.indices.bin`,
//! `<prefix>.pos.bin` (with `.index.bin` accepted as a legacy name for
//! the positions array), and `<prefix>.pos.meta` for the cap sidecar.

use std::path::{Path, PathBuf};

/// Append a literal suffix to a path, keeping any existing extension.
fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut s = prefix.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

/// Derives the file family of an index from its prefix.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    prefix: PathBuf,
}

impl IndexPaths {
    /// Wrap a prefix such as `out/corpus.23`.
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The serialized perfect hash.
    pub fn pf(&self) -> PathBuf {
        with_suffix(&self.prefix, ".pf")
    }

    /// The checker array of canonical packed k-mers.
    pub fn kmers(&self) -> PathBuf {
        with_suffix(&self.prefix, ".kmers.bin")
    }

    /// The term-frequency array.
    pub fn tf(&self) -> PathBuf {
        with_suffix(&self.prefix, ".tf.bin")
    }

    /// The prefix-sum offsets into the positions array.
    pub fn indices(&self) -> PathBuf {
        with_suffix(&self.prefix, ".indices.bin")
    }

    /// The positions array.
    pub fn positions(&self) -> PathBuf {
        with_suffix(&self.prefix, ".pos.bin")
    }

    /// Legacy name of the positions array, accepted on load.
    pub fn positions_legacy(&self) -> PathBuf {
        with_suffix(&self.prefix, ".index.bin")
    }

    /// Whichever positions file exists, preferring the current name.
    pub fn existing_positions(&self) -> PathBuf {
        let current = self.positions();
        if current.exists() {
            current
        } else {
            let legacy = self.positions_legacy();
            if legacy.exists() {
                legacy
            } else {
                current
            }
        }
    }

    /// The sidecar recording the build-time position cap.
    pub fn pos_meta(&self) -> PathBuf {
        with_suffix(&self.prefix, ".pos.meta")
    }
}

/// The `.ridx` companion of a reads blob.
///
/// `corpus.reads` maps to `corpus.ridx`; any other name gets `.ridx`
/// appended.
pub fn ridx_for(reads_path: &Path) -> PathBuf {
    if reads_path.extension().map(|e| e == "reads").unwrap_or(false) {
        reads_path.with_extension("ridx")
    } else {
        with_suffix(reads_path, ".ridx")
    }
}

/// The `.header` companion of a reads blob (FASTA inputs only).
pub fn header_for(reads_path: &Path) -> PathBuf {
    if reads_path.extension().map(|e| e == "reads").unwrap_or(false) {
        reads_path.with_extension("header")
    } else {
        with_suffix(reads_path, ".header")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_paths() {
        let paths = IndexPaths::new("out/corpus.23");
        assert_eq!(paths.pf(), PathBuf::from("out/corpus.23.pf"));
        assert_eq!(paths.kmers(), PathBuf::from("out/corpus.23.kmers.bin"));
        assert_eq!(paths.tf(), PathBuf::from("out/corpus.23.tf.bin"));
        assert_eq!(paths.indices(), PathBuf::from("out/corpus.23.indices.bin"));
        assert_eq!(paths.positions(), PathBuf::from("out/corpus.23.pos.bin"));
        assert_eq!(paths.pos_meta(), PathBuf::from("out/corpus.23.pos.meta"));
    }

    #[test]
    fn test_reads_companions() {
        assert_eq!(
            ridx_for(Path::new("corpus.reads")),
            PathBuf::from("corpus.ridx")
        );
        assert_eq!(ridx_for(Path::new("corpus")), PathBuf::from("corpus.ridx"));
        assert_eq!(
            header_for(Path::new("corpus.reads")),
            PathBuf::from("corpus.header")
        );
    }
}
