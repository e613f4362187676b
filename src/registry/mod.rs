//! Registries of named entries, and lazy lookup over them.
//!
//! A [`Registry`] maps uid strings to entries. The in-memory
//! [`EntryRegistry`] covers the common case. [`RegistryLookup`] adds one
//! layer on top: a miss is handed to an external [`RegistryHandler`]
//! registered for that registry's name, and whatever it produces is
//! registered so later lookups hit directly.

mod lookup;

pub use lookup::{RegistryHandler, RegistryLookup, handler_fn};

use std::collections::HashMap;
use std::sync::RwLock;

use crate::sync::{read, write};
use crate::{MuninError, Result};

/// A named uid → entry map.
pub trait Registry<E>: Send + Sync {
    /// Name used in errors and to pick an external handler.
    fn name(&self) -> &str;

    /// Entry registered under `uid`.
    ///
    /// A miss is [`MuninError::UnknownEntry`].
    fn get(&self, uid: &str) -> Result<E>;

    /// Register `entry` under `uid`, replacing any earlier entry.
    fn register(&self, uid: &str, entry: E);
}

/// In-memory [`Registry`].
///
/// ```rust
/// # use munin::{EntryRegistry, Registry};
/// let actions = EntryRegistry::new("actions");
/// actions.register("a1", 42);
/// assert_eq!(actions.get("a1").unwrap(), 42);
/// assert!(actions.get("a2").is_err());
/// ```
#[derive(Debug)]
pub struct EntryRegistry<E> {
    name: String,
    entries: RwLock<HashMap<String, E>>,
}

impl<E> EntryRegistry<E> {
    /// Create an empty registry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Builder form of [`Registry::register`].
    pub fn with_entry(self, uid: impl Into<String>, entry: E) -> Self {
        write(&self.entries).insert(uid.into(), entry);
        self
    }

    /// Check if an entry is registered under `uid`.
    pub fn contains(&self, uid: &str) -> bool {
        read(&self.entries).contains_key(uid)
    }

    /// Registered uids, sorted.
    pub fn uids(&self) -> Vec<String> {
        let mut uids: Vec<String> = read(&self.entries).keys().cloned().collect();
        uids.sort();
        uids
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Registry<E> for EntryRegistry<E>
where
    E: Clone + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, uid: &str) -> Result<E> {
        read(&self.entries)
            .get(uid)
            .cloned()
            .ok_or_else(|| MuninError::UnknownEntry {
                registry: self.name.clone(),
                uid: uid.to_string(),
            })
    }

    fn register(&self, uid: &str, entry: E) {
        write(&self.entries).insert(uid.to_string(), entry);
    }
}
