//! Munin - scoped, policy-driven caching with deduplicated computation
//!
//! A [`Store`] caches values per scope (global, per session, or per user)
//! under an eviction policy chosen per write: LRU, most-recent, keep-all or
//! TTL. While a value is still being produced, a pending placeholder stands
//! in for it and every caller asking for that key waits on the same
//! computation instead of starting its own.
//!
//! # Example
//!
//! ```rust
//! use munin::{CachePolicy, CacheType, ScopeContext, Store, UserIdentity};
//!
//! #[tokio::main]
//! async fn main() -> munin::Result<()> {
//!     let store: Store<String> = Store::new();
//!
//!     store.set("motd", "hello".to_string(), &CachePolicy::keep_all(), false)?;
//!
//!     let ctx = ScopeContext::new()
//!         .with_session("session-1")
//!         .with_user(UserIdentity::named("alice"));
//!     ctx.scope(async {
//!         let per_session = CachePolicy::lru(100).with_cache_type(CacheType::Session);
//!         store.set("draft", "wip".to_string(), &per_session, false)?;
//!         assert_eq!(store.get("draft", CacheType::Session, false)?, Some("wip".to_string()));
//!         munin::Result::Ok(())
//!     })
//!     .await?;
//!
//!     // Session entries are invisible from other sessions.
//!     let other = ScopeContext::new().with_session("session-2");
//!     let draft = other.sync_scope(|| store.get("draft", CacheType::Session, false))?;
//!     assert_eq!(draft, None);
//!     Ok(())
//! }
//! ```
//!
//! # Registries
//!
//! [`RegistryLookup`] resolves uids against a [`Registry`], materializing
//! missing entries through an external [`RegistryHandler`] when one is
//! installed for the registry's name.

pub mod cache;
pub mod error;
pub mod pending;
pub mod policy;
pub mod registry;
pub mod store;
mod sync;
pub mod telemetry;

// Re-export main types at crate root
pub use error::{MuninError, Result};
pub use policy::{CacheArg, CachePolicy, CacheType, CachedRegistryEntry, PolicyKind};
pub use store::{ScopeContext, ScopePrefix, Store, StoreConfig, StoreKey, UserIdentity};

pub use cache::CacheStore;
pub use pending::{
    NotificationHub, Notifier, Pending, PendingTask, PendingValue, ProgressReporter, Resolution,
    TaskDefinition, TaskMessage, TaskProgress,
};
pub use registry::{EntryRegistry, Registry, RegistryHandler, RegistryLookup, handler_fn};
