//! Tests for [`PendingTask`]: lifecycle, notifications, cancellation and
//! how the [`Store`] tracks pending tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use munin::error::BoxError;
use munin::{
    CachePolicy, CacheType, MuninError, NotificationHub, Notifier, PendingTask, ProgressReporter,
    Resolution, Store, StoreConfig, TaskDefinition, TaskMessage,
};
use serde_json::json;
use tokio_test::assert_pending;

struct Sleepy {
    cancelled: AtomicBool,
}

impl Sleepy {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            cancelled: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl TaskDefinition<String> for Sleepy {
    async fn run(&self, _progress: ProgressReporter) -> Result<String, BoxError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("late".to_string())
    }

    async fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

struct Reporting;

#[async_trait]
impl TaskDefinition<String> for Reporting {
    async fn run(&self, progress: ProgressReporter) -> Result<String, BoxError> {
        progress.report(50.0, "halfway");
        Ok("done".to_string())
    }
}

struct Failing;

#[async_trait]
impl TaskDefinition<String> for Failing {
    async fn run(&self, _progress: ProgressReporter) -> Result<String, BoxError> {
        Err("no data".into())
    }
}

/// Let spawned tasks run to their next suspension point.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn cancel_resolves_every_waiter() {
    let definition = Sleepy::new();
    let task = Arc::new(PendingTask::new(
        "t1",
        Arc::clone(&definition) as Arc<dyn TaskDefinition<String>>,
    ));
    task.start();

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let task = Arc::clone(&task);
            tokio::spawn(async move { task.wait().await })
        })
        .collect();
    settle().await;

    task.cancel().await;

    assert!(definition.cancelled.load(Ordering::SeqCst));
    for waiter in waiters {
        assert!(matches!(waiter.await.unwrap(), Resolution::Cancelled));
    }
    // Late waiters see the same outcome.
    assert!(matches!(task.wait().await, Resolution::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn second_cancel_is_a_no_op() {
    let definition = Sleepy::new();
    let task = Arc::new(PendingTask::new(
        "t1",
        Arc::clone(&definition) as Arc<dyn TaskDefinition<String>>,
    ));
    task.start();

    task.cancel().await;
    definition.cancelled.store(false, Ordering::SeqCst);
    task.cancel().await;

    assert!(!definition.cancelled.load(Ordering::SeqCst));
    assert!(matches!(task.outcome(), Some(Resolution::Cancelled)));
}

#[tokio::test]
async fn cancel_after_completion_keeps_value() {
    let task = Arc::new(PendingTask::new(
        "t1",
        Arc::new(Reporting) as Arc<dyn TaskDefinition<String>>,
    ));
    task.start();
    assert_eq!(task.wait().await.into_result().unwrap(), "done");

    task.cancel().await;
    assert!(task.outcome().is_some_and(|r| r.is_value()));
}

#[tokio::test]
async fn resolving_twice_is_rejected() {
    let task = PendingTask::new("t1", Arc::new(Reporting) as Arc<dyn TaskDefinition<String>>);
    task.resolve("first".to_string()).unwrap();

    let err = task.resolve("second".to_string()).unwrap_err();
    assert!(matches!(err, MuninError::DoubleResolution));
    assert_eq!(task.wait().await.into_result().unwrap(), "first");
}

#[tokio::test]
async fn progress_and_result_reach_notify_channels() {
    let hub = Arc::new(NotificationHub::new());
    let mut stream = hub.subscribe("ws-1");
    let task = Arc::new(
        PendingTask::new("t1", Arc::new(Reporting) as Arc<dyn TaskDefinition<String>>)
            .with_notifier(Arc::clone(&hub) as Arc<dyn Notifier>)
            .with_channel("ws-1")
            .with_cache_key("report"),
    );
    task.start();
    task.wait().await;

    assert_eq!(
        stream.next().await,
        Some(TaskMessage::Progress {
            task_id: "t1".to_string(),
            progress: 50.0,
            message: "halfway".to_string(),
        })
    );
    assert_eq!(
        stream.next().await,
        Some(TaskMessage::Result {
            task_id: "t1".to_string(),
            cache_key: Some("report".to_string()),
        })
    );
}

#[tokio::test]
async fn failure_is_reported_to_notify_channels() {
    let hub = Arc::new(NotificationHub::new());
    let mut stream = hub.subscribe("ws-1");
    let task = Arc::new(
        PendingTask::new("t1", Arc::new(Failing) as Arc<dyn TaskDefinition<String>>)
            .with_notifier(Arc::clone(&hub) as Arc<dyn Notifier>)
            .with_channel("ws-1"),
    );
    task.start();

    let err = task.wait().await.into_result().unwrap_err();
    assert_eq!(err.to_string(), "computation failed: no data");

    let message = stream.next().await.unwrap();
    assert_eq!(
        message,
        TaskMessage::Error {
            task_id: "t1".to_string(),
            error: "no data".to_string(),
        }
    );
}

#[tokio::test]
async fn closed_channels_are_dropped() {
    let hub = Arc::new(NotificationHub::new());
    let _open = hub.subscribe("ws-1");
    drop(hub.subscribe("ws-2"));

    let task = Arc::new(
        PendingTask::new("t1", Arc::new(Reporting) as Arc<dyn TaskDefinition<String>>)
            .with_notifier(Arc::clone(&hub) as Arc<dyn Notifier>)
            .with_channel("ws-1")
            .with_channel("ws-2")
            .with_channel("never-opened"),
    );
    task.start();
    task.wait().await;

    assert_eq!(task.notify_channels(), vec!["ws-1"]);
}

#[test]
fn messages_encode_as_tagged_json() {
    let message = TaskMessage::Progress {
        task_id: "t1".to_string(),
        progress: 50.0,
        message: "halfway".to_string(),
    };
    let encoded: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();

    assert_eq!(
        encoded,
        json!({"type": "progress", "task_id": "t1", "progress": 50.0, "message": "halfway"})
    );
}

#[tokio::test]
async fn store_records_task_value() {
    let store: Arc<Store<String>> = Arc::new(Store::new());
    let task = Arc::new(PendingTask::new(
        "t1",
        Arc::new(Reporting) as Arc<dyn TaskDefinition<String>>,
    ));
    store
        .set_pending_task("report", Arc::clone(&task), &CachePolicy::keep_all())
        .unwrap();
    task.start();

    let value = store.get_or_wait("report", CacheType::Global).await.unwrap();
    assert_eq!(value.as_deref(), Some("done"));
    settle().await;

    assert!(store.get_pending("report", CacheType::Global).unwrap().is_none());
    assert_eq!(
        store.get("report", CacheType::Global, false).unwrap().as_deref(),
        Some("done")
    );
}

#[tokio::test]
async fn task_value_replaces_copy_under_another_policy() {
    let store: Arc<Store<String>> = Arc::new(Store::new());
    store
        .set("report", "stale".to_string(), &CachePolicy::lru(5), true)
        .unwrap();
    let task = Arc::new(PendingTask::new(
        "t1",
        Arc::new(Reporting) as Arc<dyn TaskDefinition<String>>,
    ));
    store
        .set_pending_task("report", Arc::clone(&task), &CachePolicy::keep_all())
        .unwrap();
    task.start();

    assert!(task.wait().await.is_value());
    settle().await;

    assert_eq!(
        store.get("report", CacheType::Global, false).unwrap().as_deref(),
        Some("done")
    );
    assert_eq!(store.list(CacheType::Global).unwrap(), vec!["report"]);
}

#[tokio::test]
async fn store_drops_failed_task_without_value() {
    let store: Arc<Store<String>> = Arc::new(Store::new());
    let task = Arc::new(PendingTask::new(
        "t1",
        Arc::new(Failing) as Arc<dyn TaskDefinition<String>>,
    ));
    store
        .set_pending_task("report", Arc::clone(&task), &CachePolicy::default())
        .unwrap();
    task.start();

    let err = store
        .get_or_wait("report", CacheType::Global)
        .await
        .unwrap_err();
    assert!(matches!(err, MuninError::ComputationFailed(_)));
    settle().await;

    assert!(store.get_pending("report", CacheType::Global).unwrap().is_none());
    assert_eq!(store.get("report", CacheType::Global, false).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn store_waiters_see_cancellation() {
    let store: Arc<Store<String>> = Arc::new(Store::new());
    let task = Arc::new(PendingTask::new(
        "t1",
        Sleepy::new() as Arc<dyn TaskDefinition<String>>,
    ));
    store
        .set_pending_task("report", Arc::clone(&task), &CachePolicy::default())
        .unwrap();
    task.start();

    let waiter = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.get_or_wait("report", CacheType::Global).await })
    };
    settle().await;
    assert_eq!(task.subscriber_count(), 1);

    task.cancel().await;

    assert!(matches!(waiter.await.unwrap(), Err(MuninError::Cancelled)));
    settle().await;
    assert!(store.get_pending("report", CacheType::Global).unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn subscribers_follow_waiting_callers() {
    let store: Arc<Store<String>> = Arc::new(Store::new());
    let task = Arc::new(PendingTask::new(
        "t1",
        Sleepy::new() as Arc<dyn TaskDefinition<String>>,
    ));
    store
        .set_pending_task("report", Arc::clone(&task), &CachePolicy::default())
        .unwrap();

    let mut first = tokio_test::task::spawn(store.get_or_wait("report", CacheType::Global));
    let mut second = tokio_test::task::spawn(store.get_or_wait("report", CacheType::Global));
    assert_pending!(first.poll());
    assert_pending!(second.poll());
    assert_eq!(task.subscriber_count(), 2);

    drop(first);
    assert_eq!(task.subscriber_count(), 1);
    drop(second);
    assert_eq!(task.subscriber_count(), 0);

    // No grace period configured: orphaned tasks are left alone.
    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;
    assert!(!task.is_resolved());
}

#[tokio::test(start_paused = true)]
async fn orphaned_task_is_cancelled_after_grace() {
    let config = StoreConfig::new().orphan_grace(Duration::from_secs(5));
    let store: Arc<Store<String>> = Arc::new(Store::with_config(config));
    let definition = Sleepy::new();
    let task = Arc::new(PendingTask::new(
        "t1",
        Arc::clone(&definition) as Arc<dyn TaskDefinition<String>>,
    ));
    store
        .set_pending_task("report", Arc::clone(&task), &CachePolicy::default())
        .unwrap();
    task.start();

    let mut waiter = tokio_test::task::spawn(store.get_or_wait("report", CacheType::Global));
    assert_pending!(waiter.poll());
    drop(waiter);
    settle().await;

    tokio::time::advance(Duration::from_secs(4)).await;
    settle().await;
    assert!(!task.is_resolved());

    tokio::time::advance(Duration::from_secs(2)).await;
    settle().await;
    assert!(matches!(task.outcome(), Some(Resolution::Cancelled)));
    assert!(definition.cancelled.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn new_subscriber_during_grace_keeps_task_alive() {
    let config = StoreConfig::new().orphan_grace(Duration::from_secs(5));
    let store: Arc<Store<String>> = Arc::new(Store::with_config(config));
    let task = Arc::new(PendingTask::new(
        "t1",
        Sleepy::new() as Arc<dyn TaskDefinition<String>>,
    ));
    store
        .set_pending_task("report", Arc::clone(&task), &CachePolicy::default())
        .unwrap();
    task.start();

    let mut first = tokio_test::task::spawn(store.get_or_wait("report", CacheType::Global));
    assert_pending!(first.poll());
    drop(first);
    settle().await;

    tokio::time::advance(Duration::from_secs(3)).await;
    let mut second = tokio_test::task::spawn(store.get_or_wait("report", CacheType::Global));
    assert_pending!(second.poll());

    tokio::time::advance(Duration::from_secs(5)).await;
    settle().await;
    assert!(!task.is_resolved());
    assert_eq!(task.subscriber_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_stores_cancels_dropped_tasks() {
    let store: Arc<Store<String>> = Arc::new(Store::new());
    let definition = Sleepy::new();
    let task = Arc::new(PendingTask::new(
        "t1",
        Arc::clone(&definition) as Arc<dyn TaskDefinition<String>>,
    ));
    store
        .set_pending_task("report", Arc::clone(&task), &CachePolicy::default())
        .unwrap();
    task.start();

    let waiter = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.get_or_wait("report", CacheType::Global).await })
    };
    settle().await;

    store.empty_stores(true);

    assert!(matches!(waiter.await.unwrap(), Err(MuninError::Cancelled)));
    assert!(matches!(task.outcome(), Some(Resolution::Cancelled)));
    assert!(definition.cancelled.load(Ordering::SeqCst));
    assert!(store.get_pending("report", CacheType::Global).unwrap().is_none());
}
