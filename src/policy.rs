//! Cache policies: retention strategy plus scope.
//!
//! A [`CachePolicy`] is an immutable value. The [`Store`](crate::Store)
//! creates one cache store per distinct policy it sees, so two policies
//! that compare equal share their entries.
//!
//! ```rust
//! # use munin::{CachePolicy, CacheType};
//! let policy = CachePolicy::lru(5).with_cache_type(CacheType::Session);
//! assert_eq!(policy.cache_type, CacheType::Session);
//!
//! let from_name = CachePolicy::from_arg("user").unwrap();
//! assert_eq!(from_name, CachePolicy::lru(10).with_cache_type(CacheType::User));
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{MuninError, Result};

/// Default LRU size when only a scope is given.
pub const DEFAULT_LRU_SIZE: usize = 10;

/// Default TTL in seconds.
pub const DEFAULT_TTL_SECS: u64 = 60;

/// Which logical namespace a key lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    #[default]
    Global,
    Session,
    User,
}

impl CacheType {
    /// Look up a cache type by its name. Returns `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "global" => Some(Self::Global),
            "session" => Some(Self::Session),
            "user" => Some(Self::User),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Session => "session",
            Self::User => "user",
        }
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheType {
    type Err = MuninError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| {
            MuninError::InvalidArgument(format!(
                "unknown cache type '{s}', expected one of: global, session, user"
            ))
        })
    }
}

/// Retention strategy of a cache store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum PolicyKind {
    /// Evict the least recently used entry once `max_size` is exceeded.
    Lru {
        #[serde(default = "default_lru_size")]
        max_size: usize,
    },
    /// LRU fixed at a single entry.
    MostRecent,
    /// Never evict. Can grow without bound.
    KeepAll,
    /// Drop entries `ttl_seconds` after they were written.
    Ttl {
        #[serde(default = "default_ttl", rename = "ttl")]
        ttl_seconds: u64,
    },
}

fn default_lru_size() -> usize {
    DEFAULT_LRU_SIZE
}

fn default_ttl() -> u64 {
    DEFAULT_TTL_SECS
}

impl PolicyKind {
    /// Short policy name, also used as the `policy` metrics label.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lru { .. } => "lru",
            Self::MostRecent => "most-recent",
            Self::KeepAll => "keep-all",
            Self::Ttl { .. } => "ttl",
        }
    }
}

/// Retention strategy plus the scope its entries live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CachePolicy {
    #[serde(flatten)]
    pub kind: PolicyKind,
    #[serde(default)]
    pub cache_type: CacheType,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::lru(DEFAULT_LRU_SIZE)
    }
}

impl CachePolicy {
    /// Global LRU policy keeping at most `max_size` entries.
    pub fn lru(max_size: usize) -> Self {
        Self::global(PolicyKind::Lru { max_size })
    }

    /// Global policy keeping only the most recent entry.
    pub fn most_recent() -> Self {
        Self::global(PolicyKind::MostRecent)
    }

    /// Global policy that never evicts.
    pub fn keep_all() -> Self {
        Self::global(PolicyKind::KeepAll)
    }

    /// Global policy expiring entries `ttl_seconds` after they are set.
    pub fn ttl(ttl_seconds: u64) -> Self {
        Self::global(PolicyKind::Ttl { ttl_seconds })
    }

    fn global(kind: PolicyKind) -> Self {
        Self {
            kind,
            cache_type: CacheType::Global,
        }
    }

    /// Same policy, scoped to `cache_type`.
    pub fn with_cache_type(mut self, cache_type: CacheType) -> Self {
        self.cache_type = cache_type;
        self
    }

    /// Reject policies that can never hold an entry.
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            PolicyKind::Lru { max_size: 0 } => Err(MuninError::InvalidArgument(
                "lru policy requires max_size >= 1".to_string(),
            )),
            PolicyKind::Ttl { ttl_seconds: 0 } => Err(MuninError::InvalidArgument(
                "ttl policy requires ttl >= 1 second".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Normalize a cache argument into a concrete policy.
    ///
    /// A bare scope (enum or name) becomes an LRU policy of the default size
    /// in that scope. A policy is validated and returned unchanged.
    pub fn from_arg(arg: impl Into<CacheArg>) -> Result<Self> {
        match arg.into() {
            CacheArg::Policy(policy) => {
                policy.validate()?;
                Ok(policy)
            }
            CacheArg::Type(cache_type) => Ok(Self::default().with_cache_type(cache_type)),
            CacheArg::Name(name) => match CacheType::from_name(&name) {
                Some(cache_type) => Ok(Self::default().with_cache_type(cache_type)),
                None => Err(MuninError::InvalidArgument(format!(
                    "invalid cache argument '{name}', provide a cache policy or one of: global, session, user"
                ))),
            },
        }
    }
}

/// Anything that can be normalized into a [`CachePolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheArg {
    Type(CacheType),
    Name(String),
    Policy(CachePolicy),
}

impl From<CacheType> for CacheArg {
    fn from(value: CacheType) -> Self {
        Self::Type(value)
    }
}

impl From<CachePolicy> for CacheArg {
    fn from(value: CachePolicy) -> Self {
        Self::Policy(value)
    }
}

impl From<&str> for CacheArg {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for CacheArg {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

/// A registry item whose cached results are controlled by a policy.
///
/// Identity is the `(kind, uid)` pair; the policy does not take part in
/// equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedRegistryEntry {
    /// Type name of the entry, e.g. `"DerivedVariable"`.
    pub kind: String,
    pub uid: String,
    pub cache: CachePolicy,
}

impl CachedRegistryEntry {
    pub fn new(kind: impl Into<String>, uid: impl Into<String>, cache: CachePolicy) -> Self {
        Self {
            kind: kind.into(),
            uid: uid.into(),
            cache,
        }
    }

    /// Stable store key for this entry: `"{kind}_{uid}"`.
    pub fn to_store_key(&self) -> String {
        format!("{}_{}", self.kind, self.uid)
    }

    /// Logical key for a result owned by this entry: `"{uid}:{key}"`.
    ///
    /// Keys built this way are purged together by
    /// [`Store::purge_entry`](crate::Store::purge_entry).
    pub fn scoped_key(&self, key: &str) -> String {
        format!("{}:{key}", self.uid)
    }
}

impl PartialEq for CachedRegistryEntry {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.uid == other.uid
    }
}

impl Eq for CachedRegistryEntry {}

impl Hash for CachedRegistryEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.uid.hash(state);
    }
}
