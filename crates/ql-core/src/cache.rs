//! Explicit cache keys and memoisation.
//!
//! Expensive sub-computations are cached under a [`CacheKey`] built from the
//! inputs that determine them, instead of relying on hidden mutable state.
//! [`MemoTable`] is a per-call arena indexed by a small integer;
//! [`SolverCache`] is a shared, keyed cache that clears itself when any
//! observable it is registered with notifies a change.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::errors::Result;
use crate::patterns::observable::Observer;
use crate::Real;

/// A 64-bit hash over an explicit list of inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(u64);

impl CacheKey {
    /// Start building a key.
    pub fn builder() -> CacheKeyBuilder {
        CacheKeyBuilder {
            hasher: DefaultHasher::new(),
        }
    }

    /// The raw hash value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Incremental [`CacheKey`] builder.
///
/// Reals are hashed by bit pattern, with `-0.0` folded onto `0.0`.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    hasher: DefaultHasher,
}

impl CacheKeyBuilder {
    /// Add a real number.
    pub fn real(mut self, x: Real) -> Self {
        let x = if x == 0.0 { 0.0 } else { x };
        x.to_bits().hash(&mut self.hasher);
        self
    }

    /// Add a slice of reals (length is part of the key).
    pub fn reals(mut self, xs: &[Real]) -> Self {
        xs.len().hash(&mut self.hasher);
        for &x in xs {
            self = self.real(x);
        }
        self
    }

    /// Add an integer.
    pub fn size(mut self, n: usize) -> Self {
        n.hash(&mut self.hasher);
        self
    }

    /// Add a textual discriminator (e.g. the payoff kind).
    pub fn tag(mut self, s: &str) -> Self {
        s.hash(&mut self.hasher);
        self
    }

    /// Finish the key.
    pub fn finish(self) -> CacheKey {
        CacheKey(self.hasher.finish())
    }
}

/// Per-call memoisation table keyed by a small integer index.
///
/// Owned locally by a single calculation and dropped with it.
#[derive(Debug, Clone)]
pub struct MemoTable<V> {
    slots: Vec<Option<V>>,
}

impl<V> MemoTable<V> {
    /// Create a table with `n` empty slots.
    pub fn with_slots(n: usize) -> Self {
        Self {
            slots: (0..n).map(|_| None).collect(),
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// `true` if the table has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of filled slots.
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Return the memoised value at `idx`, computing it on first access.
    ///
    /// Slots beyond the current length are allocated on demand.
    pub fn get_or_try_insert_with<F>(&mut self, idx: usize, f: F) -> Result<&V>
    where
        F: FnOnce() -> Result<V>,
    {
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        if self.slots[idx].is_none() {
            self.slots[idx] = Some(f()?);
        }
        match &self.slots[idx] {
            Some(v) => Ok(v),
            None => Err(crate::errors::Error::NullValue),
        }
    }

    /// Read a slot without computing it.
    pub fn get(&self, idx: usize) -> Option<&V> {
        self.slots.get(idx).and_then(Option::as_ref)
    }
}

/// A shared keyed cache, invalidated by push notification.
///
/// Register the cache (as `Weak<dyn Observer>`) with every observable its
/// entries depend on; any notification clears all entries.
#[derive(Debug)]
pub struct SolverCache<V> {
    entries: Mutex<HashMap<CacheKey, Arc<V>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<V> Default for SolverCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }
}

impl<V> SolverCache<V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    /// Look up `key`, solving and inserting on a miss.
    ///
    /// The lock is not held while `solve` runs.
    pub fn get_or_try_insert_with<F>(&self, key: CacheKey, solve: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(v) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(v);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = Arc::new(solve()?);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, Arc::clone(&value));
        }
        Ok(value)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of lookups served from the cache.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of lookups that required a solve.
    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl<V: Send + Sync> Observer for SolverCache<V> {
    fn update(&self) {
        self.clear();
    }
}
