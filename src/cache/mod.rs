//! Cache Module
//!
//! Provides the bounded, path-keyed module cache shared by data and logic files.

mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::ModuleCache;
