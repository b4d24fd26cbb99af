//! Shared builder options.

use crate::constants::{effective_threads, MAX_K};

/// Options common to the index builders.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// K-mer length (1 ..= 32; 13 selects the direct-addressed path).
    pub k: usize,

    /// Worker threads; 0 defers to `AINDEX_THREADS` or the CPU count.
    pub threads: usize,

    /// Minimum term frequency kept by the hash builder; 0 keeps all.
    pub cutoff: u32,

    /// Per-id cap on stored positions; 0 means uncapped.
    pub max_tf: u32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            k: crate::constants::DEFAULT_K,
            threads: 0,
            cutoff: 0,
            max_tf: 0,
        }
    }
}

impl BuildOptions {
    /// Options for a given k with everything else defaulted.
    pub fn new(k: usize) -> Result<Self, String> {
        let options = Self {
            k,
            ..Self::default()
        };
        options.validate()?;
        Ok(options)
    }

    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<(), String> {
        if self.k == 0 || self.k > MAX_K {
            return Err(format!("k must be in range [1, {MAX_K}], got k={}", self.k));
        }
        Ok(())
    }

    /// Resolved worker count (explicit, environment, or CPU count).
    pub fn worker_threads(&self) -> usize {
        effective_threads(self.threads)
    }

    /// Log the options via tracing.
    pub fn print(&self) {
        tracing::info!("build options:");
        tracing::info!("  k = {}", self.k);
        tracing::info!("  threads = {}", self.worker_threads());
        tracing::debug!("  cutoff = {}", self.cutoff);
        if self.max_tf == 0 {
            tracing::debug!("  max_tf = uncapped");
        } else {
            tracing::info!("  max_tf = {}", self.max_tf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = BuildOptions::default();
        assert_eq!(options.k, 23);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_new_validates_k() {
        assert!(BuildOptions::new(13).is_ok());
        assert!(BuildOptions::new(32).is_ok());
        assert!(BuildOptions::new(0).is_err());
        assert!(BuildOptions::new(33).is_err());
    }

    #[test]
    fn test_worker_threads_explicit() {
        let options = BuildOptions {
            threads: 3,
            ..BuildOptions::default()
        };
        assert_eq!(options.worker_threads(), 3);
    }
}
