//! Bounded cache of per-item marker facts.
//!
//! Marker reads go through slow metadata I/O, so the decision engine
//! caches them keyed on the item's last-modified timestamp. Any
//! timestamp mismatch is a miss, never a stale hit.

use std::sync::atomic::{AtomicU64, Ordering};

use moka::sync::Cache;
use serde::Serialize;

use crate::media::CompressionMarker;

/// A cached marker lookup, valid only for the modification timestamp it
/// was recorded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedMarker {
    pub modified_at_when_cached: i64,
    pub marker: CompressionMarker,
}

/// Hit/miss counters, exposed for observability.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
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

pub struct MetadataCache {
    entries: Cache<String, CachedMarker>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MetadataCache {
    /// Creates a cache holding at most `capacity` entries.
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(capacity).build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the cached marker if one exists for exactly this
    /// modification timestamp. A mismatched entry is dropped so the
    /// caller recomputes and re-populates.
    pub fn get(&self, item_key: &str, current_modified_at_ms: i64) -> Option<CompressionMarker> {
        match self.entries.get(item_key) {
            Some(cached) if cached.modified_at_when_cached == current_modified_at_ms => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(cached.marker)
            }
            Some(_) => {
                self.entries.invalidate(item_key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Records a marker lookup keyed on the item's current modification
    /// timestamp.
    pub fn put(&self, item_key: &str, marker: CompressionMarker, current_modified_at_ms: i64) {
        self.entries.insert(
            item_key.to_string(),
            CachedMarker {
                modified_at_when_cached: current_modified_at_ms,
                marker,
            },
        );
    }

    /// Drops the entry for an item, e.g. right after it was rewritten.
    pub fn invalidate(&self, item_key: &str) {
        self.entries.invalidate(item_key);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
