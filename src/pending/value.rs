//! Single-resolution, multi-waiter cell.

use tokio::sync::watch;

use crate::error::SharedError;
use crate::telemetry;
use crate::{MuninError, Result};

/// Outcome of a pending computation, as seen by every waiter.
#[derive(Debug, Clone)]
pub enum Resolution<V> {
    Value(V),
    Failed(SharedError),
    Cancelled,
}

impl<V> Resolution<V> {
    /// Convert into a `Result`, mapping failure and cancellation to
    /// [`MuninError::ComputationFailed`] and [`MuninError::Cancelled`].
    pub fn into_result(self) -> Result<V> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Failed(error) => Err(MuninError::ComputationFailed(error)),
            Self::Cancelled => Err(MuninError::Cancelled),
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

/// A value that is not computed yet.
///
/// Any number of callers may [`wait`](Self::wait) concurrently; exactly one
/// resolution wakes all of them. Waiting after resolution returns the stored
/// outcome immediately.
#[derive(Debug)]
pub struct PendingValue<V> {
    state: watch::Sender<Option<Resolution<V>>>,
}

impl<V: Clone> PendingValue<V> {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    /// Resolve with a value. Fails with [`MuninError::DoubleResolution`] if
    /// the cell was already resolved.
    pub fn resolve(&self, value: V) -> Result<()> {
        self.settle(Resolution::Value(value))
    }

    /// Resolve with an error that every waiter will see.
    pub fn fail(&self, error: SharedError) -> Result<()> {
        self.settle(Resolution::Failed(error))
    }

    pub(crate) fn settle(&self, resolution: Resolution<V>) -> Result<()> {
        let mut slot = Some(resolution);
        let settled = self.state.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = slot.take();
            true
        });
        if settled {
            Ok(())
        } else {
            Err(MuninError::DoubleResolution)
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// The outcome, if already resolved.
    pub fn outcome(&self) -> Option<Resolution<V>> {
        self.state.borrow().clone()
    }

    /// Suspend until the cell is resolved.
    pub async fn wait(&self) -> Resolution<V> {
        let mut rx = self.state.subscribe();
        let _waiting = WaiterGauge::enter();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(state) => (*state).clone(),
            Err(_) => None,
        };
        // The sender lives as long as `self`, so the channel can't close
        // while we hold a reference.
        outcome.unwrap_or(Resolution::Cancelled)
    }
}

impl<V: Clone> Default for PendingValue<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks suspended waiters in the pending-waiters gauge, including waits
/// that are dropped before resolution.
struct WaiterGauge;

impl WaiterGauge {
    fn enter() -> Self {
        metrics::gauge!(telemetry::PENDING_WAITERS).increment(1.0);
        Self
    }
}

impl Drop for WaiterGauge {
    fn drop(&mut self) {
        metrics::gauge!(telemetry::PENDING_WAITERS).decrement(1.0);
    }
}
