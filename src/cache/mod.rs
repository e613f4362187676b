//! Cache store implementations.
//!
//! One eviction engine per policy kind, all exposing the same contract
//! over a single namespace of string keys:
//!
//! - [`LruCache`]: bounded, evicts the least recently used unpinned entry.
//!   The most-recent policy is an `LruCache` of size one.
//! - [`KeepAllCache`]: never evicts.
//! - [`TtlCache`]: entries expire a fixed time after they were written.
//!
//! `get` never fails; absence is `None`. `delete` leaves pinned entries in
//! place. Each store guards its entries with a single mutex, so an
//! evict-then-insert happens in one critical section.
//!
//! [`CacheStore`] is the closed set of engines the [`Store`](crate::Store)
//! dispatches over, selected from a [`CachePolicy`] by exhaustive match.

mod entries;
pub mod keep_all;
pub mod lru;
pub mod ttl;

pub use keep_all::KeepAllCache;
pub use lru::LruCache;
pub use ttl::TtlCache;

use std::time::Duration;

use crate::policy::{CachePolicy, PolicyKind};

/// A cache store for one concrete policy.
#[derive(Debug)]
pub enum CacheStore<V> {
    Lru(LruCache<V>),
    KeepAll(KeepAllCache<V>),
    Ttl(TtlCache<V>),
}

impl<V: Clone> CacheStore<V> {
    /// Build the engine `policy` asks for.
    pub fn for_policy(policy: &CachePolicy) -> Self {
        match policy.kind {
            PolicyKind::Lru { max_size } => Self::Lru(LruCache::new(max_size)),
            PolicyKind::MostRecent => Self::Lru(LruCache::most_recent()),
            PolicyKind::KeepAll => Self::KeepAll(KeepAllCache::new()),
            PolicyKind::Ttl { ttl_seconds } => {
                Self::Ttl(TtlCache::new(Duration::from_secs(ttl_seconds)))
            }
        }
    }

    /// Value under `key`, if present and live.
    pub fn get(&self, key: &str) -> Option<V> {
        match self {
            Self::Lru(c) => c.get(key),
            Self::KeepAll(c) => c.get(key),
            Self::Ttl(c) => c.get(key),
        }
    }

    pub fn set(&self, key: &str, value: V, pin: bool) {
        match self {
            Self::Lru(c) => c.set(key, value, pin),
            Self::KeepAll(c) => c.set(key, value, pin),
            Self::Ttl(c) => c.set(key, value, pin),
        }
    }

    /// Remove `key` unless it is pinned.
    pub fn delete(&self, key: &str) {
        match self {
            Self::Lru(c) => c.delete(key),
            Self::KeepAll(c) => c.delete(key),
            Self::Ttl(c) => c.delete(key),
        }
    }

    /// Remove `key` even if it is pinned. Returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        match self {
            Self::Lru(c) => c.remove(key),
            Self::KeepAll(c) => c.remove(key),
            Self::Ttl(c) => c.remove(key),
        }
    }

    pub fn pin(&self, key: &str) {
        match self {
            Self::Lru(c) => c.pin(key),
            Self::KeepAll(c) => c.pin(key),
            Self::Ttl(c) => c.pin(key),
        }
    }

    pub fn unpin(&self, key: &str) {
        match self {
            Self::Lru(c) => c.unpin(key),
            Self::KeepAll(c) => c.unpin(key),
            Self::Ttl(c) => c.unpin(key),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        match self {
            Self::Lru(c) => c.keys(),
            Self::KeepAll(c) => c.keys(),
            Self::Ttl(c) => c.keys(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Lru(c) => c.len(),
            Self::KeepAll(c) => c.len(),
            Self::Ttl(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        match self {
            Self::Lru(c) => c.clear(),
            Self::KeepAll(c) => c.clear(),
            Self::Ttl(c) => c.clear(),
        }
    }
}
