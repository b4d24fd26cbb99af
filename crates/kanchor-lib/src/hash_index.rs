//! K-mer id resolution and term-frequency lookup.
//!
//! Two index shapes share one API, as tagged variants rather than
//! runtime flags:
//!
//! - the general path: an MPHF over the distinct canonical k-mers plus
//!   a checker array (`.kmers.bin`) that stores the canonical word for
//!   each id, so out-of-set queries that land on an in-range id are
//!   rejected by comparison;
//! - the direct path for k = 13: the id *is* the packed canonical word,
//!   all 4¹³ slots exist, and no checker is needed.
//!
//! [`KmerResolver`] is the id mapping alone (what the builders need,
//! with tf still unwritten); [`KmerIndex`] adds the mapped tf array for
//! query time. Both are read-only and `Sync`.

use crate::codec::{canonical_of, unpack, Strand};
use crate::constants::{DIRECT_K, DIRECT_SLOTS};
use crate::error::{IndexError, Result};
use crate::mapped::TypedMap;
use crate::mphf::{read_pf, Mphf};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// MPHF plus checker array: id resolution for the general path.
#[derive(Debug)]
pub struct MphfResolver {
    k: usize,
    n: usize,
    mphf: Mphf,
    checker: TypedMap<u64>,
}

impl MphfResolver {
    /// Load the `.pf` container and the checker array, cross-validating
    /// their sizes and the checker words' unused high bits.
    pub fn open(pf_path: &Path, kmers_path: &Path) -> Result<Self> {
        info!("loading perfect hash from {}", pf_path.display());
        let mut reader = BufReader::new(File::open(pf_path)?);
        let (k, n, mphf) = read_pf(&mut reader, pf_path)?;

        let checker = TypedMap::<u64>::open(kmers_path)?;
        checker.expect_len(n as usize, "checker array")?;

        if k < 32 {
            let limit = 1u64 << (2 * k);
            if let Some(pos) = checker.as_slice().iter().position(|&word| word >= limit) {
                return Err(IndexError::corrupt(
                    kmers_path,
                    format!("checker entry {pos} does not decode as a {k}-mer"),
                ));
            }
        }

        info!("loaded hash over {n} canonical {k}-mers");
        Ok(Self {
            k,
            n: n as usize,
            mphf,
            checker,
        })
    }

    /// Id for a canonical word already known to be in the build set.
    #[inline]
    fn resolve(&self, canonical: u64) -> Option<u64> {
        let id = self.mphf.try_hash(&canonical)?;
        if id < self.n as u64 && self.checker.as_slice()[id as usize] == canonical {
            Some(id)
        } else {
            None
        }
    }
}

/// Id resolution over canonical k-mers, without term frequencies.
#[derive(Debug)]
pub enum KmerResolver {
    /// MPHF + checker (general path).
    Mphf(MphfResolver),
    /// Identity map over packed canonical 13-mers.
    Direct,
}

impl KmerResolver {
    /// K-mer length this resolver was built for.
    #[inline]
    pub fn k(&self) -> usize {
        match self {
            KmerResolver::Mphf(m) => m.k,
            KmerResolver::Direct => DIRECT_K,
        }
    }

    /// Number of ids: the distinct canonical k-mer count, or the full
    /// 4¹³ universe on the direct path.
    #[inline]
    pub fn n(&self) -> usize {
        match self {
            KmerResolver::Mphf(m) => m.n,
            KmerResolver::Direct => DIRECT_SLOTS,
        }
    }

    /// Id of a canonical packed word, if it belongs to the index.
    #[inline]
    pub fn resolve(&self, canonical: u64) -> Option<u64> {
        match self {
            KmerResolver::Mphf(m) => m.resolve(canonical),
            KmerResolver::Direct => {
                debug_assert!(canonical < DIRECT_SLOTS as u64);
                Some(canonical)
            }
        }
    }

    /// Id and matching strand for a k-mer given as bytes.
    ///
    /// Returns `None` for wrong length, non-ACGT input, or a k-mer
    /// outside the build set.
    #[inline]
    pub fn lookup(&self, kmer: &[u8]) -> Option<(u64, Strand)> {
        let (canonical, strand) = canonical_of(kmer, self.k())?;
        let id = self.resolve(canonical)?;
        Some((id, strand))
    }

    /// The canonical word stored for an id.
    #[inline]
    pub fn canonical_at(&self, id: u64) -> Option<u64> {
        match self {
            KmerResolver::Mphf(m) => m.checker.as_slice().get(id as usize).copied(),
            KmerResolver::Direct => (id < DIRECT_SLOTS as u64).then_some(id),
        }
    }

    /// Decode the canonical k-mer string for an id.
    pub fn kmer_of(&self, id: u64) -> Option<String> {
        self.canonical_at(id).map(|word| unpack(word, self.k()))
    }
}

/// Resolver plus the mapped term-frequency array: the full read-side
/// hash map of the index.
#[derive(Debug)]
pub struct KmerIndex {
    resolver: KmerResolver,
    tf: TypedMap<u32>,
}

impl KmerIndex {
    /// Open the general path: `.pf`, `.kmers.bin`, `.tf.bin`.
    pub fn open_mphf(pf_path: &Path, kmers_path: &Path, tf_path: &Path) -> Result<Self> {
        let resolver = KmerResolver::Mphf(MphfResolver::open(pf_path, kmers_path)?);
        let tf = TypedMap::<u32>::open(tf_path)?;
        tf.expect_len(resolver.n(), "term-frequency array")?;
        Ok(Self { resolver, tf })
    }

    /// Open the direct 13-mer path: a tf array of exactly 4¹³ slots.
    pub fn open_direct(tf_path: &Path) -> Result<Self> {
        let tf = TypedMap::<u32>::open(tf_path)?;
        tf.expect_len(DIRECT_SLOTS, "direct-path term-frequency array")?;
        Ok(Self {
            resolver: KmerResolver::Direct,
            tf,
        })
    }

    /// K-mer length of the index.
    #[inline]
    pub fn k(&self) -> usize {
        self.resolver.k()
    }

    /// Number of ids.
    #[inline]
    pub fn n(&self) -> usize {
        self.resolver.n()
    }

    /// The id-resolution layer.
    #[inline]
    pub fn resolver(&self) -> &KmerResolver {
        &self.resolver
    }

    /// The whole term-frequency array, indexed by id.
    #[inline]
    pub fn tf_slice(&self) -> &[u32] {
        self.tf.as_slice()
    }

    /// Term frequency by id.
    #[inline]
    pub fn tf_by_id(&self, id: u64) -> Option<u32> {
        self.tf.as_slice().get(id as usize).copied()
    }

    /// Term frequency of a k-mer; zero for anything not in the set.
    pub fn get_tf(&self, kmer: &[u8]) -> u32 {
        match self.resolver.lookup(kmer) {
            Some((id, _)) => self.tf.as_slice()[id as usize],
            None => 0,
        }
    }

    /// Id of a k-mer, if present.
    pub fn get_id(&self, kmer: &[u8]) -> Option<u64> {
        self.resolver.lookup(kmer).map(|(id, _)| id)
    }

    /// Which strand of the query matched the stored canonical form.
    ///
    /// A k-mer equal to its stored canonical word reports `Forward`;
    /// one whose reverse complement is stored reports `Reverse`. On the
    /// direct path a never-seen slot reports `NotFound` even though it
    /// structurally exists.
    pub fn get_strand(&self, kmer: &[u8]) -> Strand {
        match self.resolver.lookup(kmer) {
            Some((id, strand)) => match &self.resolver {
                KmerResolver::Direct if self.tf.as_slice()[id as usize] == 0 => Strand::NotFound,
                _ => strand,
            },
            None => Strand::NotFound,
        }
    }

    /// Decode the canonical k-mer string for an id.
    pub fn kmer_of(&self, id: u64) -> Option<String> {
        self.resolver.kmer_of(id)
    }

    /// Canonical k-mer, its reverse complement, and tf for an id.
    pub fn kmer_info(&self, id: u64) -> Option<(String, String, u32)> {
        let word = self.resolver.canonical_at(id)?;
        let tf = self.tf_by_id(id)?;
        let k = self.k();
        let rc = crate::codec::reverse_complement(word, k);
        Some((unpack(word, k), unpack(rc, k), tf))
    }
}
