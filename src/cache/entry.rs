//! Cache Entry Module
//!
//! Defines the structure for individual module cache entries.

use std::time::{SystemTime, UNIX_EPOCH};

// == Cache Entry ==
/// A loaded file plus the moment it was read from disk.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// Parsed document or compiled module
    pub value: T,
    /// Load timestamp (Unix milliseconds)
    pub last_loaded: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Wraps a freshly loaded value, stamped with the current time.
    pub fn new(value: T) -> Self {
        Self {
            value,
            last_loaded: current_timestamp_ms(),
        }
    }

    // == Age ==
    /// Milliseconds since the value was loaded.
    pub fn age_ms(&self) -> u64 {
        current_timestamp_ms().saturating_sub(self.last_loaded)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
