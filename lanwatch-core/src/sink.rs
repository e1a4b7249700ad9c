//! ## lanwatch-core::sink
//! Collaborators that consume device updates and anomaly events.
//!
//! Both traits are object safe and `Send + Sync` so the engine can hold them
//! as `Arc<dyn ...>` and the CLI can read the store while a scan runs.

use serde_json::Value;

use crate::error::PersistenceError;
use crate::models::{AnomalyEvent, AnomalyRecord, DeviceProfile};

pub const DEFAULT_ANOMALY_LIMIT: usize = 100;

pub const TOPIC_ALERT: &str = "alert";
pub const TOPIC_DEVICE: &str = "device";

/// Durable storage for the inventory and the alert history.
///
/// Each call is atomic. Implementations apply the same sticky merge as
/// [`DeviceProfile::merge`] on upsert.
pub trait EventStore: Send + Sync {
    fn upsert_device(&self, profile: &DeviceProfile) -> Result<(), PersistenceError>;

    /// All devices ordered by mac.
    fn list_devices(&self) -> Result<Vec<DeviceProfile>, PersistenceError>;

    fn insert_anomaly(&self, event: &AnomalyEvent) -> Result<i64, PersistenceError>;

    /// Newest first, at most `limit` rows.
    fn list_anomalies(&self, limit: usize) -> Result<Vec<AnomalyRecord>, PersistenceError>;
}

/// Fire-and-forget fan-out of alert and device events.
pub trait Notifier: Send + Sync {
    fn publish(&self, topic: &str, payload: Value);
}

/// Notifier for runs nobody is listening to.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn publish(&self, _topic: &str, _payload: Value) {}
}
