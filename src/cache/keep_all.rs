//! Cache store that never evicts.

use std::sync::Mutex;

use tracing::warn;

use super::entries::EntryMap;
use crate::sync::lock;
use crate::telemetry;

/// Keeps every entry until it is deleted. `delete` still respects pins.
#[derive(Debug)]
pub struct KeepAllCache<V> {
    entries: Mutex<EntryMap<V>>,
}

impl<V: Clone> KeepAllCache<V> {
    /// Create an empty store. Logs a warning since nothing bounds its size.
    pub fn new() -> Self {
        warn!("keep-all cache store created, its size is unbounded");
        Self {
            entries: Mutex::new(EntryMap::default()),
        }
    }

    /// Get the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<V> {
        let value = lock(&self.entries).get(key).map(|e| e.value.clone());
        let counter = if value.is_some() {
            telemetry::CACHE_HITS_TOTAL
        } else {
            telemetry::CACHE_MISSES_TOTAL
        };
        metrics::counter!(counter, "policy" => "keep-all").increment(1);
        value
    }

    /// Insert or replace `key`.
    pub fn set(&self, key: &str, value: V, pin: bool) {
        lock(&self.entries).insert(key, value, pin, ());
    }

    /// Remove `key` unless it is pinned.
    pub fn delete(&self, key: &str) {
        lock(&self.entries).remove_unpinned(key);
    }

    /// Remove `key` whether or not it is pinned.
    pub fn remove(&self, key: &str) -> bool {
        lock(&self.entries).remove(key).is_some()
    }

    /// Protect `key` from deletion.
    pub fn pin(&self, key: &str) {
        lock(&self.entries).set_pin(key, true);
    }

    /// Clear the pin on `key`.
    pub fn unpin(&self, key: &str) {
        lock(&self.entries).set_pin(key, false);
    }

    /// Keys in the order they were last written.
    pub fn keys(&self) -> Vec<String> {
        lock(&self.entries).keys().cloned().collect()
    }

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

impl<V: Clone> Default for KeepAllCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
