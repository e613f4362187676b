//! Pending values bound to a cancellable background computation.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::notify::{Notifier, TaskMessage};
use super::value::{PendingValue, Resolution};
use crate::sync::lock;
use crate::error::{BoxError, SharedError};
use crate::telemetry;
use crate::{MuninError, Result};

/// A unit of work a [`PendingTask`] runs.
///
/// `run` reports progress through the given reporter. `cancel` is invoked
/// once when the pending task is cancelled, after the running future has
/// been aborted.
#[async_trait]
pub trait TaskDefinition<V>: Send + Sync {
    async fn run(&self, progress: ProgressReporter) -> std::result::Result<V, BoxError>;

    async fn cancel(&self) {}
}

/// Progress update produced by a running task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskProgress {
    /// Completion in percent.
    pub progress: f32,
    pub message: String,
}

/// Handle through which a running task reports progress.
///
/// Reporting never fails; updates sent after the task finished are dropped.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    task_id: String,
    tx: mpsc::UnboundedSender<TaskProgress>,
}

impl ProgressReporter {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn report(&self, progress: f32, message: impl Into<String>) {
        let _ = self.tx.send(TaskProgress {
            progress,
            message: message.into(),
        });
    }
}

/// A pending value whose producer is a background task.
///
/// Tracks how many callers are waiting on it and forwards the task's
/// progress to every registered notification channel.
pub struct PendingTask<V> {
    task_id: String,
    cache_key: Option<String>,
    definition: Arc<dyn TaskDefinition<V>>,
    notifier: Option<Arc<dyn Notifier>>,
    pending: PendingValue<V>,
    notify_channels: Mutex<BTreeSet<String>>,
    subscribers: AtomicUsize,
    handle: Mutex<Option<AbortHandle>>,
}

impl<V> fmt::Debug for PendingTask<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTask")
            .field("task_id", &self.task_id)
            .field("cache_key", &self.cache_key)
            .field("subscribers", &self.subscribers.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<V> PendingTask<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(task_id: impl Into<String>, definition: Arc<dyn TaskDefinition<V>>) -> Self {
        Self {
            task_id: task_id.into(),
            cache_key: None,
            definition,
            notifier: None,
            pending: PendingValue::new(),
            notify_channels: Mutex::new(BTreeSet::new()),
            subscribers: AtomicUsize::new(0),
            handle: Mutex::new(None),
        }
    }

    /// Deliver progress and completion messages through `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Add a channel to notify. Can also be done after the task started.
    pub fn with_channel(self, channel: impl Into<String>) -> Self {
        self.add_notify_channel(channel);
        self
    }

    /// Cache key reported in the completion message.
    pub fn with_cache_key(mut self, cache_key: impl Into<String>) -> Self {
        self.cache_key = Some(cache_key.into());
        self
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn add_notify_channel(&self, channel: impl Into<String>) {
        lock(&self.notify_channels).insert(channel.into());
    }

    pub fn notify_channels(&self) -> Vec<String> {
        lock(&self.notify_channels).iter().cloned().collect()
    }

    /// Increment the subscriber count, returning the new count.
    pub fn add_subscriber(&self) -> usize {
        self.subscribers.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the subscriber count, returning the new count.
    pub fn remove_subscriber(&self) -> usize {
        let previous = self
            .subscribers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::Acquire)
    }

    pub fn is_resolved(&self) -> bool {
        self.pending.is_resolved()
    }

    pub fn outcome(&self) -> Option<Resolution<V>> {
        self.pending.outcome()
    }

    /// Suspend until the task resolves, fails or is cancelled.
    pub async fn wait(&self) -> Resolution<V> {
        self.pending.wait().await
    }

    pub fn resolve(&self, value: V) -> Result<()> {
        self.pending.resolve(value)
    }

    pub fn fail(&self, error: SharedError) -> Result<()> {
        self.pending.fail(error)
    }

    /// Spawn the bound computation on the current tokio runtime.
    ///
    /// Does nothing if the task was already started or resolved.
    pub fn start(self: &Arc<Self>) {
        let mut handle = lock(&self.handle);
        if handle.is_some() || self.is_resolved() {
            return;
        }
        let task = Arc::clone(self);
        let join = tokio::spawn(async move { task.drive().await });
        *handle = Some(join.abort_handle());
    }

    async fn drive(self: Arc<Self>) {
        info!(task_id = %self.task_id, "task started");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reporter = ProgressReporter {
            task_id: self.task_id.clone(),
            tx,
        };

        let run = self.definition.run(reporter);
        tokio::pin!(run);
        let outcome = loop {
            tokio::select! {
                outcome = &mut run => break outcome,
                Some(update) = rx.recv() => self.forward_progress(update),
            }
        };
        while let Ok(update) = rx.try_recv() {
            self.forward_progress(update);
        }

        let settled = match outcome {
            Ok(value) => {
                self.broadcast(TaskMessage::Result {
                    task_id: self.task_id.clone(),
                    cache_key: self.cache_key.clone(),
                });
                self.pending.resolve(value)
            }
            Err(error) => {
                let error: SharedError = Arc::from(error);
                warn!(task_id = %self.task_id, error = %error, "task failed");
                self.broadcast(TaskMessage::Error {
                    task_id: self.task_id.clone(),
                    error: error.to_string(),
                });
                self.pending.fail(error)
            }
        };
        match settled {
            Ok(()) => info!(task_id = %self.task_id, "task finished"),
            Err(MuninError::DoubleResolution) => {
                debug!(task_id = %self.task_id, "task finished after it was already resolved")
            }
            Err(e) => warn!(task_id = %self.task_id, error = %e, "failed to settle task"),
        }
    }

    /// Cancel the computation and resolve every waiter with
    /// [`Resolution::Cancelled`]. A no-op once the task has resolved.
    pub async fn cancel(&self) {
        if self.is_resolved() {
            return;
        }
        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            handle.abort();
        }
        self.definition.cancel().await;

        if self.pending.settle(Resolution::Cancelled).is_ok() {
            metrics::counter!(telemetry::TASKS_CANCELLED_TOTAL).increment(1);
            info!(task_id = %self.task_id, "task cancelled");
            self.broadcast(TaskMessage::Error {
                task_id: self.task_id.clone(),
                error: MuninError::Cancelled.to_string(),
            });
        }
    }

    fn forward_progress(&self, update: TaskProgress) {
        self.broadcast(TaskMessage::Progress {
            task_id: self.task_id.clone(),
            progress: update.progress,
            message: update.message,
        });
    }

    /// Best-effort delivery. Channels that refuse a message are dropped.
    fn broadcast(&self, message: TaskMessage) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let mut channels = lock(&self.notify_channels);
        channels.retain(|channel| {
            let delivered = notifier.deliver(channel, &message);
            if !delivered {
                debug!(task_id = %self.task_id, channel = %channel, "dropping closed notify channel");
            }
            delivered
        });
    }
}
