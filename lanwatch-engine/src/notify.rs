//! ## lanwatch-engine::notify
//! In-process fan-out of alerts and device changes.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

use lanwatch_core::sink::Notifier;

pub const DEFAULT_NOTIFY_CAPACITY: usize = 256;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Notification {
    pub topic: String,
    pub payload: Value,
}

/// [`Notifier`] over a tokio broadcast channel.
///
/// Slow subscribers lag and lose the oldest notifications; publishing never
/// waits for them.
#[derive(Clone, Debug)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFY_CAPACITY)
    }
}

impl Notifier for BroadcastNotifier {
    fn publish(&self, topic: &str, payload: Value) {
        let notification = Notification {
            topic: topic.to_string(),
            payload,
        };
        if self.sender.send(notification).is_err() {
            trace!(topic, "No subscribers");
        }
    }
}
