//! Store keys: a logical key qualified by its scope.
//!
//! Encoding:
//!
//! - global: `global:{key}`
//! - session: `session:{len}:{session_id}:{key}`
//! - user: `user:{len}:{user_key}:{key}`
//!
//! `len` is the byte length of the id, which keeps the prefixes of two
//! different ids from ever overlapping even when ids contain `:`.

use std::fmt;

use super::context::ScopeContext;
use crate::policy::CacheType;
use crate::{MuninError, Result};

/// A logical namespace: global, or one specific session or user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopePrefix(String);

impl ScopePrefix {
    /// Prefix for `cache_type` in the caller's ambient context.
    pub fn current(cache_type: CacheType) -> Result<Self> {
        let id = match cache_type {
            CacheType::Global => return Ok(Self("global:".to_string())),
            CacheType::Session => ScopeContext::current_session_id(),
            CacheType::User => ScopeContext::current_user_key(),
        };
        let id = id.ok_or(MuninError::MissingScopeContext(cache_type))?;
        Ok(Self(format!("{cache_type}:{}:{id}:", id.len())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn key(&self, logical_key: &str) -> StoreKey {
        StoreKey(format!("{}{logical_key}", self.0))
    }

    /// Logical key of `store_key` if it lives under this prefix.
    pub fn strip<'a>(&self, store_key: &'a str) -> Option<&'a str> {
        store_key.strip_prefix(self.0.as_str())
    }
}

/// Fully qualified key used inside cache stores and the pending table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey(String);

impl StoreKey {
    /// Qualify `logical_key` for `cache_type` in the caller's context.
    pub fn resolve(cache_type: CacheType, logical_key: &str) -> Result<Self> {
        Ok(ScopePrefix::current(cache_type)?.key(logical_key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
