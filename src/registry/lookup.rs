//! Lookup with lazy materialization through external handlers.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, info};

use super::Registry;
use crate::sync::{read, write};
use crate::telemetry::REGISTRY_MATERIALIZATIONS_TOTAL;
use crate::{MuninError, Result};

/// Produces registry entries that were not registered ahead of time.
#[async_trait]
pub trait RegistryHandler<E>: Send + Sync {
    async fn resolve(&self, uid: &str) -> Result<E>;
}

struct FnHandler<F, E> {
    f: F,
    _entry: PhantomData<fn() -> E>,
}

#[async_trait]
impl<F, Fut, E> RegistryHandler<E> for FnHandler<F, E>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<E>> + Send + 'static,
    E: Send + 'static,
{
    async fn resolve(&self, uid: &str) -> Result<E> {
        (self.f)(uid.to_string()).await
    }
}

/// Wrap an async closure as a [`RegistryHandler`].
///
/// ```rust
/// # use munin::handler_fn;
/// let handler = handler_fn(|uid: String| async move { Ok(format!("app for {uid}")) });
/// ```
pub fn handler_fn<E, F, Fut>(f: F) -> Arc<dyn RegistryHandler<E>>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<E>> + Send + 'static,
    E: Send + 'static,
{
    Arc::new(FnHandler {
        f,
        _entry: PhantomData,
    })
}

/// Registry lookup that falls back to external handlers on a miss.
///
/// Holds no entries of its own: a materialized entry is registered into
/// the registry it was looked up in.
pub struct RegistryLookup<E> {
    handlers: RwLock<HashMap<String, Arc<dyn RegistryHandler<E>>>>,
}

impl<E> RegistryLookup<E>
where
    E: Clone + Send + Sync,
{
    /// Create a lookup with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Builder form of [`register_handler`](Self::register_handler).
    pub fn with_handler(
        self,
        registry: impl Into<String>,
        handler: Arc<dyn RegistryHandler<E>>,
    ) -> Self {
        self.register_handler(registry, handler);
        self
    }

    /// Install `handler` for the registry named `registry`, replacing any
    /// earlier one.
    pub fn register_handler(
        &self,
        registry: impl Into<String>,
        handler: Arc<dyn RegistryHandler<E>>,
    ) {
        let registry = registry.into();
        debug!(registry = %registry, "registered lookup handler");
        write(&self.handlers).insert(registry, handler);
    }

    /// Check if a handler is installed for `registry`.
    pub fn has_handler(&self, registry: &str) -> bool {
        self.handler(registry).is_some()
    }

    /// Entry `uid` from `registry`.
    ///
    /// On a miss the handler for `registry.name()` produces the entry,
    /// which is registered before being returned. Without a handler the
    /// miss becomes [`MuninError::NotFound`] with the original miss as its
    /// source. Errors other than a miss, including handler errors, are
    /// returned as they are.
    pub async fn get(&self, registry: &dyn Registry<E>, uid: &str) -> Result<E> {
        let miss = match registry.get(uid) {
            Ok(entry) => return Ok(entry),
            Err(miss @ MuninError::UnknownEntry { .. }) => miss,
            Err(e) => return Err(e),
        };

        let Some(handler) = self.handler(registry.name()) else {
            return Err(MuninError::NotFound {
                registry: registry.name().to_string(),
                uid: uid.to_string(),
                source: Box::new(miss),
            });
        };

        let entry = handler.resolve(uid).await?;
        registry.register(uid, entry.clone());
        metrics::counter!(
            REGISTRY_MATERIALIZATIONS_TOTAL,
            "registry" => registry.name().to_string()
        )
        .increment(1);
        info!(registry = registry.name(), uid, "materialized registry entry");
        Ok(entry)
    }

    fn handler(&self, registry: &str) -> Option<Arc<dyn RegistryHandler<E>>> {
        read(&self.handlers).get(registry).cloned()
    }
}

impl<E> Default for RegistryLookup<E>
where
    E: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
