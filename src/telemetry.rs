//! Telemetry metric name constants.
//!
//! Centralised metric names for munin operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `munin_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `policy`: eviction policy of the cache store ("lru", "most-recent",
//!   "keep-all", "ttl")
//! - `registry`: registry name for lookup materializations

/// Total cache hits on a cache store.
///
/// Labels: `policy`.
pub const CACHE_HITS_TOTAL: &str = "munin_cache_hits_total";

/// Total cache misses on a cache store.
///
/// Labels: `policy`.
pub const CACHE_MISSES_TOTAL: &str = "munin_cache_misses_total";

/// Total entries evicted to respect a size bound.
///
/// Labels: `policy`.
pub const CACHE_EVICTIONS_TOTAL: &str = "munin_cache_evictions_total";

/// Total entries dropped because their TTL elapsed.
pub const CACHE_EXPIRATIONS_TOTAL: &str = "munin_cache_expirations_total";

/// Callers currently suspended on a pending value or task.
pub const PENDING_WAITERS: &str = "munin_pending_waiters";

/// Total pending tasks resolved as cancelled.
pub const TASKS_CANCELLED_TOTAL: &str = "munin_tasks_cancelled_total";

/// Total registry entries materialized by an external handler.
///
/// Labels: `registry`.
pub const REGISTRY_MATERIALIZATIONS_TOTAL: &str = "munin_registry_materializations_total";
