//! Hash caching module.
//!
//! This module provides persistent storage for file digests so repeated
//! scans of an unchanged tree do not re-read file contents.
//!
//! # Architecture
//!
//! * [`database`]: SQLite persistence, schema versioning, LRU eviction
//! * [`entry`]: Row model and the [`DigestKind`] selector
//!
//! # Cache Invalidation
//!
//! Rows are keyed by absolute path and validated against the file's size
//! and modification time (nanosecond precision). Any mismatch is a miss.
//! After a completed scan the cache drops rows for files under the scan
//! root that were not seen, then evicts least-recently-used rows down to
//! capacity.

pub mod database;
pub mod entry;

pub use database::{CacheError, CacheResult, CacheStats, HashCache, DEFAULT_CAPACITY};
pub use entry::{CacheEntry, DigestKind};
