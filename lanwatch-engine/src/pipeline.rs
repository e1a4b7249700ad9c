//! ## lanwatch-engine::pipeline
//! **Per-frame processing**
//!
//! Registry first, then the detector, then storage and notification for
//! whatever they produced. Storage failures are logged, counted and
//! otherwise ignored so one bad write never stalls detection.

use std::sync::Arc;

use opentelemetry::KeyValue;
use serde::Serialize;
use tracing::{error, trace, warn};

use lanwatch_core::error::PersistenceError;
use lanwatch_core::models::{AnomalyEvent, CapturedFrame, DeviceChange, DeviceUpdate};
use lanwatch_core::sink::{EventStore, Notifier, TOPIC_ALERT, TOPIC_DEVICE};
use lanwatch_detection::AnomalyDetector;
use lanwatch_inventory::DeviceRegistry;
use lanwatch_telemetry::{EventLogger, MetricsRecorder};

/// What one frame produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameOutcome {
    pub device: Option<DeviceUpdate>,
    pub anomalies: Vec<AnomalyEvent>,
    pub persistence_failures: usize,
}

pub struct Pipeline {
    registry: DeviceRegistry,
    detector: AnomalyDetector,
    store: Arc<dyn EventStore>,
    notifier: Arc<dyn Notifier>,
    metrics: MetricsRecorder,
}

impl Pipeline {
    pub fn new(
        registry: DeviceRegistry,
        detector: AnomalyDetector,
        store: Arc<dyn EventStore>,
        notifier: Arc<dyn Notifier>,
        metrics: MetricsRecorder,
    ) -> Self {
        Self {
            registry,
            detector,
            store,
            notifier,
            metrics,
        }
    }

    pub fn process(&mut self, captured: &CapturedFrame) -> FrameOutcome {
        let _timer = self.metrics.frame_processing.start_timer();
        let mut outcome = FrameOutcome::default();

        match self.registry.observe(&captured.frame, captured.timestamp) {
            Ok(Some(update)) => {
                self.metrics.devices_upserted.inc();
                self.announce_device(&update);
                outcome.device = Some(update);
            }
            Ok(None) => {}
            Err(e) => {
                self.persistence_failed("upsert_device", &e);
                outcome.persistence_failures += 1;
            }
        }

        let anomalies = self.detector.detect_counted(
            &captured.frame,
            captured.timestamp,
            captured.frames_last_second,
        );
        for event in anomalies {
            if let Err(e) = self.store.insert_anomaly(&event) {
                self.persistence_failed("insert_anomaly", &e);
                outcome.persistence_failures += 1;
            }
            self.announce_anomaly(&event);
            outcome.anomalies.push(event);
        }

        outcome
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut DeviceRegistry {
        &mut self.registry
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    fn announce_device(&self, update: &DeviceUpdate) {
        let profile = &update.profile;
        match update.change {
            DeviceChange::New => EventLogger::log_event(
                "device_discovered",
                vec![
                    KeyValue::new("mac", profile.mac.to_string()),
                    KeyValue::new("ip", profile.ip.to_string()),
                    KeyValue::new(
                        "vendor",
                        profile.vendor.clone().unwrap_or_default(),
                    ),
                ],
            ),
            DeviceChange::IpChanged => {
                trace!(mac = %profile.mac, ip = %profile.ip, "Device moved to a new ip")
            }
            DeviceChange::Refreshed => return,
        }
        self.publish(TOPIC_DEVICE, update);
    }

    fn announce_anomaly(&self, event: &AnomalyEvent) {
        self.metrics.inc_anomaly(event.kind.as_str());
        EventLogger::log_event(
            "anomaly_detected",
            vec![
                KeyValue::new("kind", event.kind.as_str()),
                KeyValue::new("description", event.description.clone()),
                KeyValue::new("dedup_key", event.dedup_key.clone()),
            ],
        );
        self.publish(TOPIC_ALERT, event);
    }

    fn publish<T: Serialize>(&self, topic: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(payload) => self.notifier.publish(topic, payload),
            Err(e) => warn!(topic, error = %e, "Dropping unserializable notification"),
        }
    }

    fn persistence_failed(&self, operation: &'static str, err: &PersistenceError) {
        self.metrics.persistence_errors.inc();
        error!(operation, error = %err, "Storage operation failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use lanwatch_config::DetectionConfig;
    use lanwatch_core::models::{AnomalyKind, AnomalyRecord, DeviceProfile};
    use lanwatch_core::sink::NullNotifier;
    use lanwatch_protocols::arp::ARP_OP_REPLY;
    use lanwatch_protocols::frame::build;
    use lanwatch_protocols::{Frame, MacAddr};
    use lanwatch_storage::SqliteStore;
    use std::net::Ipv4Addr;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn arp_reply(mac: MacAddr, ip: Ipv4Addr, secs: i64) -> CapturedFrame {
        let bytes = build::arp(ARP_OP_REPLY, mac, ip, Ipv4Addr::new(10, 0, 0, 1));
        CapturedFrame::new(at(secs), Frame::decode(&bytes).unwrap())
    }

    fn pipeline(store: Arc<SqliteStore>) -> Pipeline {
        let detector = AnomalyDetector::new(&DetectionConfig::default()).unwrap();
        Pipeline::new(
            DeviceRegistry::offline(store.clone()),
            detector,
            store,
            Arc::new(NullNotifier),
            MetricsRecorder::new(),
        )
    }

    #[test]
    fn spoofed_arp_is_stored_and_counted() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let mut pipeline = pipeline(store.clone());
        let ip = Ipv4Addr::new(10, 0, 0, 5);
        let aa = MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0xaa]);
        let bb = MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0xbb]);

        let first = pipeline.process(&arp_reply(aa, ip, 0));
        assert_eq!(first.device.map(|d| d.change), Some(DeviceChange::New));
        assert!(first.anomalies.is_empty());

        let second = pipeline.process(&arp_reply(bb, ip, 1));
        assert_eq!(second.anomalies.len(), 1);
        assert_eq!(second.anomalies[0].kind, AnomalyKind::ArpSpoof);

        let stored: Vec<AnomalyRecord> = store.list_anomalies(10).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].event.dedup_key, "arp_10.0.0.5");
        assert_eq!(store.list_devices().unwrap().len(), 2);

        let metrics = pipeline.metrics();
        assert_eq!(metrics.devices_upserted.get(), 2);
        assert_eq!(
            metrics.anomalies.with_label_values(&["ARP_SPOOF"]).get(),
            1
        );
        assert_eq!(metrics.persistence_errors.get(), 0);
    }

    #[test]
    fn refreshed_devices_keep_first_seen() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let mut pipeline = pipeline(store.clone());
        let mac = MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x01]);
        let ip = Ipv4Addr::new(10, 0, 0, 9);

        pipeline.process(&arp_reply(mac, ip, 0));
        let outcome = pipeline.process(&arp_reply(mac, ip, 30));
        assert_eq!(outcome.device.map(|d| d.change), Some(DeviceChange::Refreshed));

        let stored: Vec<DeviceProfile> = store.list_devices().unwrap();
        assert_eq!(stored[0].first_seen, at(0));
        assert_eq!(stored[0].last_seen, at(30));
    }
}
