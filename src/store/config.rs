//! Store configuration.
//!
//! Loaded from TOML or built in code:
//!
//! ```toml
//! orphan_grace_secs = 30
//!
//! [default_policy]
//! policy = "lru"
//! max_size = 100
//! cache_type = "global"
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::policy::CachePolicy;
use crate::{MuninError, Result};

/// Configuration for a [`Store`](crate::Store).
///
/// ```rust
/// # use munin::{CachePolicy, StoreConfig};
/// # use std::time::Duration;
/// let config = StoreConfig::new()
///     .default_policy(CachePolicy::ttl(300))
///     .orphan_grace(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Policy used by [`Store::insert`](crate::Store::insert).
    /// Default: global LRU of 10 entries.
    pub default_policy: CachePolicy,
    /// Cancel a pending task this many seconds after its last subscriber
    /// left, if it is still unresolved and unsubscribed. Default: never.
    pub orphan_grace_secs: Option<u64>,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_policy(mut self, policy: CachePolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn orphan_grace(mut self, grace: Duration) -> Self {
        self.orphan_grace_secs = Some(grace.as_secs());
        self
    }

    pub fn orphan_grace_duration(&self) -> Option<Duration> {
        self.orphan_grace_secs.map(Duration::from_secs)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            MuninError::Configuration(format!("Failed to parse store config: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MuninError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        self.default_policy
            .validate()
            .map_err(|e| MuninError::Configuration(format!("default_policy: {e}")))
    }
}
