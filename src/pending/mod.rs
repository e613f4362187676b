//! Pending placeholders for values that are still being computed.
//!
//! - [`PendingValue`]: a single-resolution cell many callers can await.
//! - [`PendingTask`]: a pending value driven by a cancellable
//!   [`TaskDefinition`], with subscriber counting and progress forwarding
//!   to notification channels.
//!
//! Waiting uses a `tokio::sync::watch` channel, so waiters are woken by the
//! resolution itself rather than by polling.

pub mod notify;
pub mod task;
pub mod value;

pub use notify::{NotificationHub, Notifier, TaskMessage};
pub use task::{PendingTask, ProgressReporter, TaskDefinition, TaskProgress};
pub use value::{PendingValue, Resolution};

use std::sync::Arc;

use crate::Result;
use crate::error::SharedError;

/// A pending placeholder installed in a [`Store`](crate::Store).
#[derive(Debug)]
pub enum Pending<V> {
    Value(Arc<PendingValue<V>>),
    Task(Arc<PendingTask<V>>),
}

impl<V> Clone for Pending<V> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(v) => Self::Value(Arc::clone(v)),
            Self::Task(t) => Self::Task(Arc::clone(t)),
        }
    }
}

impl<V> Pending<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub async fn wait(&self) -> Resolution<V> {
        match self {
            Self::Value(v) => v.wait().await,
            Self::Task(t) => t.wait().await,
        }
    }

    pub fn resolve(&self, value: V) -> Result<()> {
        match self {
            Self::Value(v) => v.resolve(value),
            Self::Task(t) => t.resolve(value),
        }
    }

    pub fn fail(&self, error: SharedError) -> Result<()> {
        match self {
            Self::Value(v) => v.fail(error),
            Self::Task(t) => t.fail(error),
        }
    }

    pub fn is_resolved(&self) -> bool {
        match self {
            Self::Value(v) => v.is_resolved(),
            Self::Task(t) => t.is_resolved(),
        }
    }

    /// Whether both handles point at the same placeholder.
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => Arc::ptr_eq(a, b),
            (Self::Task(a), Self::Task(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
