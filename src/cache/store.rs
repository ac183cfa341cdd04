//! Module Cache Store
//!
//! Path-keyed storage combining a HashMap with LRU tracking. Holds whatever the
//! loader produced for a file: a parsed document or a compiled logic module.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::cache::{CacheEntry, CacheStats, LruTracker};

// == Module Cache ==
/// Bounded LRU cache keyed by absolute file path.
///
/// Performs no I/O. A present entry reflects the file as of its last load,
/// which may be older than the file on disk until the path is invalidated.
///
/// Every path has a generation that moves forward on `invalidate` and
/// `clear`. A loader records it before reading a file and stores the result
/// with [`ModuleCache::set_if_current`], so content read before an
/// invalidation is never cached after it.
#[derive(Debug)]
pub struct ModuleCache<T> {
    /// Path to loaded value
    entries: HashMap<PathBuf, CacheEntry<T>>,
    /// LRU access tracker
    lru: LruTracker,
    /// Hit/miss/eviction counters
    stats: CacheStats,
    /// Maximum number of entries allowed
    capacity: usize,
    /// Per-path invalidation counters; kept after removal
    generations: HashMap<PathBuf, u64>,
    /// Bumped by `clear`, shared by every path
    epoch: u64,
}

impl<T: Clone> ModuleCache<T> {
    // == Constructor ==
    /// Creates an empty cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            capacity: capacity.max(1),
            generations: HashMap::new(),
            epoch: 0,
        }
    }

    // == Get ==
    /// Returns a clone of the cached value and promotes the entry.
    pub fn get(&mut self, path: &Path) -> Option<T> {
        match self.entries.get(path) {
            Some(entry) => {
                let value = entry.value.clone();
                self.stats.record_hit();
                self.lru.touch(path);
                Some(value)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Inserts or overwrites the value for `path`.
    ///
    /// When a new path would exceed capacity, the least recently used entry is
    /// evicted first.
    pub fn set(&mut self, path: PathBuf, value: T) {
        let is_overwrite = self.entries.contains_key(&path);

        if !is_overwrite && self.entries.len() >= self.capacity {
            if let Some(evicted) = self.lru.evict_oldest() {
                self.entries.remove(&evicted);
                self.stats.record_eviction();
            }
        }

        self.lru.touch(&path);
        self.entries.insert(path, CacheEntry::new(value));
        self.stats.set_total_entries(self.entries.len());
    }

    // == Generation ==
    /// Current generation of `path`. Compare with a later value to learn
    /// whether the path was invalidated in between.
    pub fn generation(&self, path: &Path) -> u64 {
        self.epoch + self.generations.get(path).copied().unwrap_or(0)
    }

    /// Stores `value` only if `path` is still at `generation`. Returns whether
    /// it was stored.
    pub fn set_if_current(&mut self, path: PathBuf, value: T, generation: u64) -> bool {
        if self.generation(&path) != generation {
            return false;
        }
        self.set(path, value);
        true
    }

    // == Invalidate ==
    /// Drops the entry for `path` and advances its generation, even when
    /// nothing is cached. Returns whether an entry was removed.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        *self.generations.entry(path.to_path_buf()).or_insert(0) += 1;

        if self.entries.remove(path).is_some() {
            self.lru.remove(path);
            self.stats.record_invalidation();
            self.stats.set_total_entries(self.entries.len());
            true
        } else {
            false
        }
    }

    // == Clear ==
    /// Drops every entry and advances every generation. Counters are kept.
    pub fn clear(&mut self) {
        self.epoch += 1;
        self.entries.clear();
        self.lru.clear();
        self.stats.set_total_entries(0);
    }

    /// Milliseconds since the entry for `path` was loaded, without promoting it.
    pub fn age_ms(&self, path: &Path) -> Option<u64> {
        self.entries.get(path).map(|entry| entry.age_ms())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
