//! Time-to-live cache store.
//!
//! Expiry is checked lazily on access; there is no background sweeper.
//! An expired entry is dropped even when pinned.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::entries::EntryMap;
use crate::sync::lock;
use crate::telemetry;

/// Store whose entries live for a fixed duration after each write.
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<EntryMap<V, Instant>>,
}

impl<V: Clone> TtlCache<V> {
    /// Create an empty store with the given entry lifetime.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(EntryMap::default()),
        }
    }

    /// Lifetime of each entry.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current value for `key`, or `None` once its TTL has elapsed.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = lock(&self.entries);
        let expired = match entries.get(key) {
            Some(entry) if entry.meta <= now => true,
            Some(entry) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "policy" => "ttl").increment(1);
                return Some(entry.value.clone());
            }
            None => false,
        };
        if expired {
            entries.remove(key);
            metrics::counter!(telemetry::CACHE_EXPIRATIONS_TOTAL).increment(1);
            debug!(key, "ttl entry expired");
        }
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "policy" => "ttl").increment(1);
        None
    }

    /// Insert or replace `key`; its expiry restarts from now.
    pub fn set(&self, key: &str, value: V, pin: bool) {
        let expires_at = Instant::now() + self.ttl;
        lock(&self.entries).insert(key, value, pin, expires_at);
    }

    /// Remove `key` unless it is pinned.
    pub fn delete(&self, key: &str) {
        lock(&self.entries).remove_unpinned(key);
    }

    /// Remove `key` regardless of its pin.
    pub fn remove(&self, key: &str) -> bool {
        lock(&self.entries).remove(key).is_some()
    }

    /// Pin `key`. A pin does not stop it from expiring.
    pub fn pin(&self, key: &str) {
        lock(&self.entries).set_pin(key, true);
    }

    /// Release the pin on `key`.
    pub fn unpin(&self, key: &str) {
        lock(&self.entries).set_pin(key, false);
    }

    /// Live keys in write order. Expired entries are swept on the way.
    pub fn keys(&self) -> Vec<String> {
        let mut entries = lock(&self.entries);
        self.sweep(&mut entries);
        entries.keys().cloned().collect()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let mut entries = lock(&self.entries);
        self.sweep(&mut entries);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    fn sweep(&self, entries: &mut EntryMap<V, Instant>) {
        let now = Instant::now();
        let expired = entries.keys_where(|entry| entry.meta <= now);
        for key in expired {
            entries.remove(&key);
            metrics::counter!(telemetry::CACHE_EXPIRATIONS_TOTAL).increment(1);
        }
    }
}
