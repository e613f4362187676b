//! Best-effort delivery of task messages to notification channels.
//!
//! A [`Notifier`] routes [`TaskMessage`]s to channels identified by string
//! ids (e.g. one per connected websocket). Delivery never fails loudly: a
//! closed or unknown channel simply reports `false` and the sender drops it.
//!
//! [`NotificationHub`] is an in-process notifier backed by unbounded tokio
//! channels, one per subscriber.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::Result;
use crate::sync::lock;

/// Message sent to the notify channels of a pending task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskMessage {
    Progress {
        task_id: String,
        progress: f32,
        message: String,
    },
    Result {
        task_id: String,
        cache_key: Option<String>,
    },
    Error {
        task_id: String,
        error: String,
    },
}

impl TaskMessage {
    pub fn task_id(&self) -> &str {
        match self {
            Self::Progress { task_id, .. }
            | Self::Result { task_id, .. }
            | Self::Error { task_id, .. } => task_id,
        }
    }

    /// JSON payload, e.g. `{"type":"progress","task_id":"t1",...}`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Outbound channel router.
pub trait Notifier: Send + Sync {
    /// Deliver `message` to `channel`. Returns `false` if the channel is
    /// closed or unknown.
    fn deliver(&self, channel: &str, message: &TaskMessage) -> bool;
}

/// In-process [`Notifier`] over tokio mpsc channels.
#[derive(Debug, Default)]
pub struct NotificationHub {
    channels: Mutex<HashMap<String, mpsc::UnboundedSender<TaskMessage>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `channel`, replacing any previous subscriber of the same id.
    pub fn subscribe(&self, channel: impl Into<String>) -> UnboundedReceiverStream<TaskMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.channels).insert(channel.into(), tx);
        UnboundedReceiverStream::new(rx)
    }

    pub fn close(&self, channel: &str) {
        lock(&self.channels).remove(channel);
    }

    pub fn is_open(&self, channel: &str) -> bool {
        lock(&self.channels)
            .get(channel)
            .is_some_and(|tx| !tx.is_closed())
    }
}

impl Notifier for NotificationHub {
    fn deliver(&self, channel: &str, message: &TaskMessage) -> bool {
        let mut channels = lock(&self.channels);
        let Some(tx) = channels.get(channel) else {
            return false;
        };
        if tx.send(message.clone()).is_ok() {
            return true;
        }
        channels.remove(channel);
        false
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    fn progress(task_id: &str) -> TaskMessage {
        TaskMessage::Progress {
            task_id: task_id.to_string(),
            progress: 50.0,
            message: "halfway".to_string(),
        }
    }

    #[tokio::test]
    async fn delivers_to_subscriber() {
        let hub = NotificationHub::new();
        let mut stream = hub.subscribe("ws-1");

        assert!(hub.deliver("ws-1", &progress("t1")));
        assert_eq!(stream.next().await, Some(progress("t1")));
    }

    #[test]
    fn unknown_channel_is_not_an_error() {
        let hub = NotificationHub::new();
        assert!(!hub.deliver("nobody", &progress("t1")));
    }

    #[test]
    fn closed_channel_is_dropped() {
        let hub = NotificationHub::new();
        let stream = hub.subscribe("ws-1");
        drop(stream);

        assert!(!hub.deliver("ws-1", &progress("t1")));
        assert!(!hub.is_open("ws-1"));
    }

    #[test]
    fn json_payload_is_tagged() {
        let json = TaskMessage::Result {
            task_id: "t1".into(),
            cache_key: Some("k".into()),
        }
        .to_json()
        .unwrap();
        assert_eq!(json, r#"{"type":"result","task_id":"t1","cache_key":"k"}"#);
    }
}
