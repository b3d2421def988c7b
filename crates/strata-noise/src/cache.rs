//! Sharded LRU cache for pure, recomputable samples.
//!
//! Every value stored here is a pure function of its key, so eviction only
//! costs time. Compute closures run outside the shard lock: two threads
//! missing the same key at once may both compute it, and both get the same
//! value.

use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use rustc_hash::FxBuildHasher;

/// Resolution tier reserved for per-column memoisation of `Column` nodes.
pub const COLUMN_TIER: u8 = 0xFF;

/// Key of one cached scalar sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SampleKey {
    pub seed: u64,
    /// Distinguishes graphs sharing one cache (e.g. area presets).
    pub graph: u32,
    pub node: u32,
    /// Lattice step the sample was taken at, or [`COLUMN_TIER`].
    pub tier: u8,
    pub position: [i32; 3],
}

/// Hit/miss counters, for logging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A bounded cache split into independently locked LRU shards.
pub struct SampleCache<K, V> {
    shards: Vec<Mutex<LruCache<K, V>>>,
    hasher: FxBuildHasher,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: Hash + Eq + Clone, V: Clone> SampleCache<K, V> {
    /// Create a cache holding about `capacity` entries across `shards` shards.
    ///
    /// Both values are raised to at least 1; every shard holds
    /// `ceil(capacity / shards)` entries.
    pub fn new(capacity: usize, shards: usize) -> Self {
        let shards = shards.max(1);
        let per_shard = capacity.max(1).div_ceil(shards);
        let per_shard = NonZeroUsize::new(per_shard).unwrap_or(NonZeroUsize::MIN);
        Self {
            shards: (0..shards)
                .map(|_| Mutex::new(LruCache::new(per_shard)))
                .collect(),
            hasher: FxBuildHasher,
            capacity: per_shard.get() * shards,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn shard(&self, key: &K) -> MutexGuard<'_, LruCache<K, V>> {
        let index = (self.hasher.hash_one(key) % self.shards.len() as u64) as usize;
        // Entries are pure values; a panic elsewhere cannot leave one half-written.
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `key`, marking it most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let found = self.shard(key).get(key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub fn insert(&self, key: K, value: V) {
        self.shard(&key).put(key, value);
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    pub fn get_or_compute(&self, key: K, compute: impl FnOnce() -> V) -> V {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = compute();
        self.insert(key, value.clone());
        value
    }

    /// Like [`get_or_compute`](Self::get_or_compute) for fallible computations.
    /// Errors are returned as-is and nothing is stored.
    pub fn try_get_or_compute<E>(
        &self,
        key: K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Drop every entry whose key matches `predicate`. Returns how many were removed.
    pub fn evict_where(&self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = shard.lock().unwrap_or_else(PoisonError::into_inner);
            let doomed: Vec<K> = shard
                .iter()
                .filter(|&(k, _)| predicate(k))
                .map(|(k, _)| k.clone())
                .collect();
            for key in doomed {
                shard.pop(&key);
                removed += 1;
            }
        }
        removed
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
            capacity: self.capacity,
        }
    }
}

impl<K, V> std::fmt::Debug for SampleCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleCache")
            .field("shards", &self.shards.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_get_or_compute_computes_once_when_cached() {
        let cache = SampleCache::new(16, 2);
        let calls = AtomicUsize::new(0);
        for _ in 0..5 {
            let v = cache.get_or_compute(7_u32, || {
                calls.fetch_add(1, Ordering::Relaxed);
                49.0
            });
            assert_eq!(v, 49.0);
        }
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 4);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_capacity_bounds_entries() {
        let cache = SampleCache::new(8, 1);
        for i in 0..100_u32 {
            cache.insert(i, i);
        }
        assert_eq!(cache.len(), 8);
        // Least recently used entries went first.
        assert_eq!(cache.get(&0), None);
        assert_eq!(cache.get(&99), Some(99));
    }

    #[test]
    fn test_shard_capacity_rounds_up() {
        let cache: SampleCache<u32, u32> = SampleCache::new(10, 4);
        assert_eq!(cache.capacity(), 12);
        let tiny: SampleCache<u32, u32> = SampleCache::new(0, 0);
        assert_eq!(tiny.capacity(), 1);
    }

    #[test]
    fn test_try_get_or_compute_does_not_cache_errors() {
        let cache: SampleCache<u32, f64> = SampleCache::new(4, 1);
        let err: Result<f64, &str> = cache.try_get_or_compute(1, || Err("boom"));
        assert_eq!(err, Err("boom"));
        assert!(cache.is_empty(), "Failed computations must not be stored");
        let ok: Result<f64, &str> = cache.try_get_or_compute(1, || Ok(2.0));
        assert_eq!(ok, Ok(2.0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evict_where_and_clear() {
        let cache = SampleCache::new(256, 4);
        for i in 0..20_u32 {
            cache.insert(i, i * 10);
        }
        let removed = cache.evict_where(|k| k % 2 == 0);
        assert_eq!(removed, 10);
        assert_eq!(cache.len(), 10);
        assert_eq!(cache.get(&4), None);
        assert_eq!(cache.get(&5), Some(50));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_access_yields_consistent_values() {
        let cache = Arc::new(SampleCache::new(256, 8));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..500_u64 {
                        let key = (i * 7 + t) % 300;
                        let v = cache.get_or_compute(key, || key * key);
                        assert_eq!(v, key * key);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(cache.len() <= cache.capacity());
    }

    #[test]
    fn test_sample_keys_differ_by_tier() {
        let cache = SampleCache::new(16, 2);
        let key = SampleKey {
            seed: 1,
            graph: 0,
            node: 3,
            tier: 4,
            position: [0, 0, 0],
        };
        cache.insert(key, 1.0);
        let column = SampleKey {
            tier: COLUMN_TIER,
            ..key
        };
        assert_eq!(cache.get(&column), None);
        assert_eq!(cache.get(&key), Some(1.0));
    }
}
