//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for module cache eviction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Every touch stamps the key with a monotonically increasing tick, so
/// promotion is a single map write. Finding the oldest key scans the map,
/// which only happens when the cache overflows.
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Last access tick per key
    ticks: HashMap<PathBuf, u64>,
    /// Next tick to hand out
    clock: u64,
}

impl LruTracker {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self {
            ticks: HashMap::new(),
            clock: 0,
        }
    }

    // == Touch ==
    /// Marks a key as most recently used.
    pub fn touch(&mut self, key: &Path) {
        self.clock += 1;
        match self.ticks.get_mut(key) {
            Some(tick) => *tick = self.clock,
            None => {
                self.ticks.insert(key.to_path_buf(), self.clock);
            }
        }
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &Path) {
        self.ticks.remove(key);
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<PathBuf> {
        let oldest = self.peek_oldest()?.to_path_buf();
        self.ticks.remove(&oldest);
        Some(oldest)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&Path> {
        self.ticks
            .iter()
            .min_by_key(|(_, tick)| **tick)
            .map(|(key, _)| key.as_path())
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.ticks.clear();
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Checks if a key is being tracked.
    pub fn contains(&self, key: &Path) -> bool {
        self.ticks.contains_key(key)
    }
}
