//! The scoped store.
//!
//! [`Store`] maps `(scope, key)` to a value. Every distinct [`CachePolicy`]
//! gets its own [`CacheStore`], created on first use. Session and user
//! scopes are resolved from the ambient [`ScopeContext`], so the same
//! logical key set by two sessions never collides.
//!
//! Next to the cache stores the store keeps a table of pending
//! placeholders. Callers of [`Store::get_or_wait`] that find a placeholder
//! instead of a value suspend until it resolves, so a value is produced at
//! most once no matter how many callers ask for it concurrently:
//!
//! ```rust
//! # use munin::{CacheType, CachePolicy, Store};
//! # async fn demo() -> munin::Result<()> {
//! let store: Store<String> = Store::new();
//! store.set_pending_value("report", CacheType::Global)?;
//!
//! // Elsewhere, many callers:
//! // let report = store.get_or_wait("report", CacheType::Global).await?;
//!
//! // The producer:
//! store.set("report", "done".to_string(), &CachePolicy::default(), false)?;
//! assert_eq!(store.get_or_wait("report", CacheType::Global).await?, Some("done".to_string()));
//! # Ok(())
//! # }
//! ```
//!
//! The pending table and each cache store have their own locks and no
//! operation holds two of them at once.

pub mod config;
pub mod context;
pub mod key;

pub use config::StoreConfig;
pub use context::{ScopeContext, UserIdentity};
pub use key::{ScopePrefix, StoreKey};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::error::SharedError;
use crate::pending::{Pending, PendingTask, PendingValue, Resolution};
use crate::policy::{CachePolicy, CacheType, CachedRegistryEntry};
use crate::Result;
use crate::sync::{lock, read, write};

/// Scoped, policy-driven value cache with deduplicated computation.
pub struct Store<V> {
    config: StoreConfig,
    /// One cache store per policy, in creation order.
    caches: RwLock<Vec<(CachePolicy, Arc<CacheStore<V>>)>>,
    pending: Mutex<HashMap<StoreKey, Pending<V>>>,
}

impl<V> Store<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            caches: RwLock::new(Vec::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Value stored under `key` in `cache_type`'s scope.
    ///
    /// With `unpin`, the entry's pin is cleared after a successful read.
    pub fn get(&self, key: &str, cache_type: CacheType, unpin: bool) -> Result<Option<V>> {
        let store_key = StoreKey::resolve(cache_type, key)?;
        for cache in self.caches_for(cache_type) {
            if let Some(value) = cache.get(store_key.as_str()) {
                if unpin {
                    cache.unpin(store_key.as_str());
                }
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Write `value` into the cache store for `policy`.
    ///
    /// A key lives in one cache store per scope: a copy written earlier
    /// under another policy of the same scope is removed, pinned or not.
    /// A pending value installed under the same key is resolved with `value`
    /// and removed from the pending table.
    pub fn set(&self, key: &str, value: V, policy: &CachePolicy, pin: bool) -> Result<()> {
        policy.validate()?;
        let store_key = StoreKey::resolve(policy.cache_type, key)?;
        self.write(&store_key, value.clone(), policy, pin);

        let placeholder = {
            let mut table = lock(&self.pending);
            if matches!(table.get(&store_key), Some(Pending::Value(_))) {
                table.remove(&store_key)
            } else {
                None
            }
        };
        if let Some(placeholder) = placeholder {
            if let Err(e) = placeholder.resolve(value) {
                warn!(key = %store_key, error = %e, "pending value was resolved elsewhere");
            }
        }
        Ok(())
    }

    /// [`set`](Self::set) with the configured default policy, unpinned.
    pub fn insert(&self, key: &str, value: V) -> Result<()> {
        let policy = self.config.default_policy;
        self.set(key, value, &policy, false)
    }

    /// Delete `key` from `cache_type`'s scope. Pinned entries stay.
    pub fn delete(&self, key: &str, cache_type: CacheType) -> Result<()> {
        let store_key = StoreKey::resolve(cache_type, key)?;
        for cache in self.caches_for(cache_type) {
            cache.delete(store_key.as_str());
        }
        Ok(())
    }

    /// Install a pending value under `key`, replacing any earlier
    /// placeholder. Waiters on the replaced placeholder keep waiting on it.
    pub fn set_pending_value(
        &self,
        key: &str,
        cache_type: CacheType,
    ) -> Result<Arc<PendingValue<V>>> {
        let store_key = StoreKey::resolve(cache_type, key)?;
        let pending = Arc::new(PendingValue::new());
        debug!(key = %store_key, "installed pending value");
        lock(&self.pending).insert(store_key, Pending::Value(Arc::clone(&pending)));
        Ok(pending)
    }

    /// Install a pending task under `key`, replacing any earlier placeholder.
    ///
    /// Once the task succeeds its value is written into the cache store for
    /// `policy`. Whatever the outcome, the placeholder is then dropped, if it
    /// has not been replaced in the meantime.
    pub fn set_pending_task(
        self: &Arc<Self>,
        key: &str,
        task: Arc<PendingTask<V>>,
        policy: &CachePolicy,
    ) -> Result<()> {
        policy.validate()?;
        let store_key = StoreKey::resolve(policy.cache_type, key)?;
        debug!(key = %store_key, task_id = task.task_id(), "installed pending task");
        lock(&self.pending).insert(store_key.clone(), Pending::Task(Arc::clone(&task)));

        let store = Arc::clone(self);
        let policy = *policy;
        tokio::spawn(async move {
            let resolution = task.wait().await;
            store.settle_task(&store_key, &task, resolution, &policy);
        });
        Ok(())
    }

    fn settle_task(
        &self,
        store_key: &StoreKey,
        task: &Arc<PendingTask<V>>,
        resolution: Resolution<V>,
        policy: &CachePolicy,
    ) {
        let installed = |table: &HashMap<StoreKey, Pending<V>>| {
            matches!(table.get(store_key), Some(Pending::Task(t)) if Arc::ptr_eq(t, task))
        };

        if !installed(&*lock(&self.pending)) {
            debug!(key = %store_key, task_id = task.task_id(), "task placeholder was replaced");
            return;
        }
        if let Resolution::Value(value) = resolution {
            self.write(store_key, value, policy, false);
        }

        let mut table = lock(&self.pending);
        if installed(&*table) {
            table.remove(store_key);
        }
    }

    /// Placeholder currently installed under `key`, if any.
    pub fn get_pending(&self, key: &str, cache_type: CacheType) -> Result<Option<Pending<V>>> {
        let store_key = StoreKey::resolve(cache_type, key)?;
        Ok(lock(&self.pending).get(&store_key).cloned())
    }

    /// Fail and remove the placeholder under `key`. Every waiter receives
    /// `error`.
    pub fn fail_pending(&self, key: &str, cache_type: CacheType, error: SharedError) -> Result<()> {
        let store_key = StoreKey::resolve(cache_type, key)?;
        let placeholder = lock(&self.pending).remove(&store_key);
        if let Some(placeholder) = placeholder {
            placeholder.fail(error)?;
        }
        Ok(())
    }

    /// Value under `key`, waiting for a pending placeholder to resolve.
    ///
    /// Returns `Ok(None)` when there is neither a value nor a placeholder.
    /// A failed or cancelled computation is returned as
    /// [`MuninError::ComputationFailed`](crate::MuninError::ComputationFailed) or
    /// [`MuninError::Cancelled`](crate::MuninError::Cancelled).
    pub async fn get_or_wait(&self, key: &str, cache_type: CacheType) -> Result<Option<V>> {
        let store_key = StoreKey::resolve(cache_type, key)?;
        if let Some(value) = self.lookup(&store_key, cache_type) {
            return Ok(Some(value));
        }

        let placeholder = lock(&self.pending).get(&store_key).cloned();
        let Some(placeholder) = placeholder else {
            // The producer may have finished between the two lookups.
            return Ok(self.lookup(&store_key, cache_type));
        };

        let resolution = match &placeholder {
            Pending::Value(pending) => pending.wait().await,
            Pending::Task(task) => {
                let _subscription =
                    Subscription::new(Arc::clone(task), self.config.orphan_grace_duration());
                task.wait().await
            }
        };
        resolution.into_result().map(Some)
    }

    /// Logical keys present in `cache_type`'s scope of the current context,
    /// sorted.
    pub fn list(&self, cache_type: CacheType) -> Result<Vec<String>> {
        let prefix = ScopePrefix::current(cache_type)?;
        let mut keys = Vec::new();
        for cache in self.caches_for(cache_type) {
            keys.extend(
                cache
                    .keys()
                    .iter()
                    .filter_map(|key| prefix.strip(key))
                    .map(str::to_string),
            );
        }
        keys.sort();
        Ok(keys)
    }

    /// Clear every cache store. With `include_pending`, pending
    /// placeholders are dropped as well: their waiters receive
    /// [`MuninError::Cancelled`](crate::MuninError::Cancelled) and running
    /// tasks are cancelled.
    pub fn empty_stores(&self, include_pending: bool) {
        let caches = read(&self.caches);
        for (_, cache) in caches.iter() {
            cache.clear();
        }
        drop(caches);

        if include_pending {
            let dropped: Vec<(StoreKey, Pending<V>)> = lock(&self.pending).drain().collect();
            for (store_key, placeholder) in dropped {
                cancel_placeholder(&store_key, placeholder);
            }
        }
        info!(include_pending, "emptied cache stores");
    }

    /// Delete every key starting with `prefix` in `cache_type`'s scope of
    /// the current context. Other scopes are untouched.
    pub fn remove_starting_with(&self, prefix: &str, cache_type: CacheType) -> Result<()> {
        let full_prefix = ScopePrefix::current(cache_type)?.key(prefix);
        for cache in self.caches_for(cache_type) {
            for key in cache.keys() {
                if key.starts_with(full_prefix.as_str()) {
                    cache.delete(&key);
                }
            }
        }
        Ok(())
    }

    /// Purge every result cached for a registry entry in its own scope.
    pub fn purge_entry(&self, entry: &CachedRegistryEntry) -> Result<()> {
        self.remove_starting_with(&entry.scoped_key(""), entry.cache.cache_type)
    }

    /// Cached entries across every scope plus pending placeholders.
    pub fn len(&self) -> usize {
        let cached: usize = read(&self.caches)
            .iter()
            .map(|(_, cache)| cache.len())
            .sum();
        cached + lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, store_key: &StoreKey, cache_type: CacheType) -> Option<V> {
        self.caches_for(cache_type)
            .iter()
            .find_map(|cache| cache.get(store_key.as_str()))
    }

    fn write(&self, store_key: &StoreKey, value: V, policy: &CachePolicy, pin: bool) {
        let target = self.cache_for(policy);
        for cache in self.caches_for(policy.cache_type) {
            if !Arc::ptr_eq(&cache, &target) && cache.remove(store_key.as_str()) {
                debug!(
                    key = %store_key,
                    policy = policy.kind.name(),
                    "moved entry to another cache store"
                );
            }
        }
        target.set(store_key.as_str(), value, pin);
    }

    fn caches_for(&self, cache_type: CacheType) -> Vec<Arc<CacheStore<V>>> {
        read(&self.caches)
            .iter()
            .filter(|(policy, _)| policy.cache_type == cache_type)
            .map(|(_, cache)| Arc::clone(cache))
            .collect()
    }

    fn cache_for(&self, policy: &CachePolicy) -> Arc<CacheStore<V>> {
        {
            let caches = read(&self.caches);
            if let Some((_, cache)) = caches.iter().find(|(p, _)| p == policy) {
                return Arc::clone(cache);
            }
        }

        let mut caches = write(&self.caches);
        if let Some((_, cache)) = caches.iter().find(|(p, _)| p == policy) {
            return Arc::clone(cache);
        }
        info!(
            policy = policy.kind.name(),
            cache_type = %policy.cache_type,
            "creating cache store"
        );
        let cache = Arc::new(CacheStore::for_policy(policy));
        caches.push((*policy, Arc::clone(&cache)));
        cache
    }
}

impl<V> Default for Store<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Settle a placeholder that was dropped from the pending table.
fn cancel_placeholder<V>(store_key: &StoreKey, placeholder: Pending<V>)
where
    V: Clone + Send + Sync + 'static,
{
    match placeholder {
        Pending::Value(pending) => {
            if pending.settle(Resolution::Cancelled).is_ok() {
                debug!(key = %store_key, "cancelled dropped pending value");
            }
        }
        Pending::Task(task) => {
            if task.is_resolved() {
                return;
            }
            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                warn!(
                    key = %store_key,
                    task_id = task.task_id(),
                    "no runtime to cancel dropped task"
                );
                return;
            };
            runtime.spawn(async move { task.cancel().await });
        }
    }
}

/// One `get_or_wait` caller attached to a pending task.
///
/// Dropping it (on completion or when the caller goes away) releases the
/// subscription. When the last subscriber leaves an unresolved task and an
/// orphan grace period is configured, the task is cancelled once the grace
/// period passes without a new subscriber.
struct Subscription<V>
where
    V: Clone + Send + Sync + 'static,
{
    task: Arc<PendingTask<V>>,
    grace: Option<Duration>,
}

impl<V> Subscription<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn new(task: Arc<PendingTask<V>>, grace: Option<Duration>) -> Self {
        task.add_subscriber();
        Self { task, grace }
    }
}

impl<V> Drop for Subscription<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        let remaining = self.task.remove_subscriber();
        if remaining > 0 || self.task.is_resolved() {
            return;
        }
        let Some(grace) = self.grace else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let task = Arc::clone(&self.task);
        runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            if task.subscriber_count() == 0 && !task.is_resolved() {
                debug!(task_id = task.task_id(), "cancelling orphaned task");
                task.cancel().await;
            }
        });
    }
}
