//! Deterministic seed derivation.
//!
//! A [`SeedManager`] turns one master seed into any number of child seeds by
//! hashing the master seed together with a string key. Derivation is a pure
//! function of `(master_seed, key)`, so seeds are stable across instances,
//! processes and call order. Child managers form a seed tree that lets
//! independent generation domains (for example "members" and "claims") be
//! partitioned across workers without sharing mutable state.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

/// Master seed used when the caller does not supply one.
pub const DEFAULT_MASTER_SEED: u64 = 42;

/// Number of digest bytes folded into a derived seed.
const SEED_BYTES: usize = 8;

/// Derives and memoises child seeds from a master seed.
///
/// The cache is owned by the instance. It is not shared between managers,
/// and mutating it requires `&mut self`, so a manager must be partitioned
/// (for example with [`SeedManager::child_manager`]) before fanning work out
/// to several threads.
///
/// # Example
///
/// ```
/// use membersim::SeedManager;
///
/// let mut first = SeedManager::new(42);
/// let mut second = SeedManager::new(42);
///
/// assert_eq!(first.get_seed("member_0"), second.get_seed("member_0"));
/// assert_ne!(first.get_seed("member_0"), first.get_seed("member_1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedManager {
    master_seed: u64,
    cache: HashMap<String, u64>,
}

impl Default for SeedManager {
    fn default() -> Self {
        Self::new(DEFAULT_MASTER_SEED)
    }
}

impl SeedManager {
    /// Creates a manager rooted at `master_seed`.
    #[must_use]
    pub fn new(master_seed: u64) -> Self {
        Self {
            master_seed,
            cache: HashMap::new(),
        }
    }

    /// Returns the root seed of this manager.
    #[must_use]
    pub const fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derives a seed from a master seed and key without caching.
    ///
    /// The seed is the first eight bytes of `SHA-256("{master_seed}:{key}")`
    /// read as a big-endian unsigned integer.
    #[must_use]
    #[expect(
        clippy::big_endian_bytes,
        reason = "derived seeds are defined over the big-endian digest prefix"
    )]
    pub fn derive_seed(master_seed: u64, key: &str) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(format!("{master_seed}:{key}"));
        let digest = hasher.finalize();
        let mut prefix = [0_u8; SEED_BYTES];
        for (dst, src) in prefix.iter_mut().zip(digest.iter()) {
            *dst = *src;
        }
        u64::from_be_bytes(prefix)
    }

    /// Returns the deterministic seed for `key`, memoising the result.
    ///
    /// # Example
    ///
    /// ```
    /// use membersim::SeedManager;
    ///
    /// let mut manager = SeedManager::new(42);
    /// assert_eq!(manager.get_seed("test"), 2_722_589_206_991_647_647);
    /// ```
    pub fn get_seed(&mut self, key: &str) -> u64 {
        if let Some(seed) = self.cache.get(key) {
            return *seed;
        }
        let seed = Self::derive_seed(self.master_seed, key);
        self.cache.insert(key.to_owned(), seed);
        seed
    }

    /// Yields `get_seed("{prefix}_{i}")` for every `i` in `0..count`.
    ///
    /// Calling this again with the same arguments reproduces the same
    /// sequence.
    pub fn get_seeds<'a>(
        &'a mut self,
        prefix: &'a str,
        count: usize,
    ) -> impl Iterator<Item = u64> + 'a {
        (0..count).map(move |index| self.get_seed(&format!("{prefix}_{index}")))
    }

    /// Creates a manager whose master seed is `get_seed("namespace:{namespace}")`.
    ///
    /// # Example
    ///
    /// ```
    /// use membersim::SeedManager;
    ///
    /// let mut root = SeedManager::new(42);
    /// let claims = root.child_manager("claims");
    /// let members = root.child_manager("members");
    ///
    /// assert_ne!(claims.master_seed(), members.master_seed());
    /// ```
    pub fn child_manager(&mut self, namespace: &str) -> Self {
        let child_seed = self.get_seed(&format!("namespace:{namespace}"));
        Self::new(child_seed)
    }

    /// Clears the memoisation cache.
    ///
    /// Later derivations are unaffected because they are pure.
    pub fn reset(&mut self) {
        self.cache.clear();
    }

    /// Returns the number of memoised keys.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}
