//! Least-recently-used cache store.
//!
//! Pins take precedence over the size bound: when every entry is pinned and
//! the cache is full, an insert still succeeds and the cache temporarily
//! holds more than `max_size` entries. The first insert after pins are
//! released evicts back down to the bound.

use std::sync::Mutex;

use tracing::debug;

use super::entries::EntryMap;
use crate::sync::lock;
use crate::telemetry;

/// LRU store. Also backs the most-recent policy with `max_size == 1`.
#[derive(Debug)]
pub struct LruCache<V> {
    max_size: usize,
    policy: &'static str,
    entries: Mutex<EntryMap<V>>,
}

impl<V: Clone> LruCache<V> {
    /// Create a store holding at most `max_size` unpinned entries.
    pub fn new(max_size: usize) -> Self {
        Self::named(max_size, "lru")
    }

    /// Single-entry store: every insert evicts the previous unpinned entry.
    pub fn most_recent() -> Self {
        Self::named(1, "most-recent")
    }

    fn named(max_size: usize, policy: &'static str) -> Self {
        Self {
            max_size: max_size.max(1),
            policy,
            entries: Mutex::new(EntryMap::default()),
        }
    }

    /// Configured bound, at least one.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Current value for `key`. A hit refreshes its recency.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = lock(&self.entries);
        let value = entries.get(key).map(|e| e.value.clone());
        match value {
            Some(value) => {
                entries.touch(key);
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "policy" => self.policy)
                    .increment(1);
                Some(value)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "policy" => self.policy)
                    .increment(1);
                None
            }
        }
    }

    /// Insert or replace `key`, evicting least recently used unpinned
    /// entries so the new entry fits.
    pub fn set(&self, key: &str, value: V, pin: bool) {
        let mut entries = lock(&self.entries);
        if !entries.contains(key) {
            while entries.len() >= self.max_size {
                let Some(victim) = entries.oldest_unpinned() else {
                    debug!(
                        policy = self.policy,
                        size = entries.len(),
                        max_size = self.max_size,
                        "all entries pinned, growing past max_size"
                    );
                    break;
                };
                entries.remove(&victim);
                metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "policy" => self.policy)
                    .increment(1);
                debug!(policy = self.policy, key = %victim, "evicted entry");
            }
        }
        entries.insert(key, value, pin, ());
    }

    /// Remove `key` unless it is pinned.
    pub fn delete(&self, key: &str) {
        lock(&self.entries).remove_unpinned(key);
    }

    /// Remove `key` even if it is pinned. Returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        lock(&self.entries).remove(key).is_some()
    }

    /// Protect `key` from eviction and deletion.
    pub fn pin(&self, key: &str) {
        lock(&self.entries).set_pin(key, true);
    }

    /// Release the pin on `key`; a missing key is ignored.
    pub fn unpin(&self, key: &str) {
        lock(&self.entries).set_pin(key, false);
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> Vec<String> {
        lock(&self.entries).keys().cloned().collect()
    }

    /// Number of entries, pinned ones included.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry, pinned or not.
    pub fn clear(&self) {
        lock(&self.entries).clear();
    }
}
