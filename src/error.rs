//! Munin error types

use std::sync::Arc;

use crate::policy::CacheType;

/// Error produced by a task computation, shared between every waiter.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Boxed error returned from [`TaskDefinition::run`](crate::pending::TaskDefinition::run).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Munin error types
#[derive(Debug, thiserror::Error)]
pub enum MuninError {
    // Policy errors
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // Registry errors
    #[error("no entry '{uid}' in the {registry} registry")]
    UnknownEntry { registry: String, uid: String },

    /// Lookup miss with no external handler; `source` is the original miss.
    #[error(
        "could not find uid {uid} in {registry} registry, did you register it before the app was initialized?"
    )]
    NotFound {
        registry: String,
        uid: String,
        #[source]
        source: Box<MuninError>,
    },

    // Pending state errors
    /// A pending cell was resolved twice. Always a programming error.
    #[error("pending value was already resolved")]
    DoubleResolution,

    #[error("task was cancelled")]
    Cancelled,

    #[error("computation failed: {0}")]
    ComputationFailed(#[source] SharedError),

    // Scope errors
    #[error("no ambient {0} context for a {0}-scoped cache access")]
    MissingScopeContext(CacheType),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Munin operations
pub type Result<T> = std::result::Result<T, MuninError>;
