//! Cache Store Module
//!
//! Key/value storage with lazy, read-driven TTL eviction.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::cache::{CacheEntry, CacheStats};

// == TTL Cache ==
/// In-memory map from string keys to values with a per-entry time-to-live.
///
/// Expired entries are removed by the read that discovers them, by
/// [`sweep_expired`](Self::sweep_expired), or by an explicit clear. Nothing
/// runs in the background unless a sweep task is spawned for the store.
/// Every operation is total.
#[derive(Debug)]
pub struct TtlCache<T> {
    entries: HashMap<String, CacheEntry<T>>,
    stats: CacheStats,
}

impl<T> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TtlCache<T> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
        }
    }

    // == Set ==
    /// Stores `value` under `key` for `ttl`, replacing any existing entry.
    ///
    /// A zero `ttl` would create an entry that is already stale, so it
    /// stores nothing and drops whatever `key` held before.
    pub fn set(&mut self, key: impl Into<String>, value: T, ttl: Duration) {
        let key = key.into();
        if ttl.is_zero() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, CacheEntry::new(value, ttl));
        }
        self.stats.set_total_entries(self.entries.len());
    }

    // == Clear ==
    /// Removes the entry for `key`, if any.
    pub fn clear(&mut self, key: &str) {
        self.entries.remove(key);
        self.stats.set_total_entries(self.entries.len());
    }

    // == Clear All ==
    pub fn clear_all(&mut self) {
        self.entries.clear();
        self.stats.set_total_entries(0);
    }

    // == Sweep Expired ==
    /// Removes all expired entries and returns how many were dropped.
    pub fn sweep_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - self.entries.len();

        self.stats.record_sweep(removed);
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    /// Returns true if `key` holds an entry that has not expired. Does not evict.
    pub fn contains_live(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|entry| !entry.is_expired())
    }

    /// Remaining lifetime of a live entry.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(CacheEntry::ttl_remaining)
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }
}

impl<T: Clone> TtlCache<T> {
    // == Get ==
    /// Returns a clone of the live value for `key`.
    ///
    /// A stale entry is deleted in the same call that finds it, so no caller
    /// ever observes a value past its expiry.
    pub fn get(&mut self, key: &str) -> Option<T> {
        let expired = match self.entries.get(key) {
            None => {
                self.stats.record_miss();
                return None;
            }
            Some(entry) => entry.is_expired(),
        };

        if expired {
            self.entries.remove(key);
            self.stats.record_expired_on_read();
            self.stats.set_total_entries(self.entries.len());
            trace!(key, "evicted expired entry on read");
            return None;
        }

        self.stats.record_hit();
        self.entries.get(key).map(|entry| entry.value.clone())
    }
}
