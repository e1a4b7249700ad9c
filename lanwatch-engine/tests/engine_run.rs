use std::net::Ipv4Addr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::Value;

use lanwatch_capture::{CaptureError, CaptureEvent, CaptureStats, PacketSource, RawPacket};
use lanwatch_config::LanwatchConfig;
use lanwatch_core::events::BackpressurePolicy;
use lanwatch_core::models::{AnomalyEvent, AnomalyKind, AnomalyRecord, DeviceProfile};
use lanwatch_core::sink::{EventStore, Notifier, TOPIC_ALERT, TOPIC_DEVICE};
use lanwatch_core::PersistenceError;
use lanwatch_engine::{BroadcastNotifier, Engine};
use lanwatch_protocols::dhcp::{self, DHCP_CLIENT_PORT, DHCP_SERVER_PORT, OPTION_MESSAGE_TYPE};
use lanwatch_protocols::frame::build;
use lanwatch_protocols::MacAddr;
use lanwatch_storage::SqliteStore;
use lanwatch_telemetry::MetricsRecorder;

const ROUTER: MacAddr = MacAddr::new([0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x01]);
const ROGUE: MacAddr = MacAddr::new([0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x66]);
const LAPTOP: MacAddr = MacAddr::new([0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x20]);

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// Replays a fixed list of packets in one slice.
struct VecSource {
    packets: Vec<RawPacket>,
}

impl PacketSource for VecSource {
    fn run(
        &mut self,
        _terminate: &AtomicBool,
        on_event: &mut dyn FnMut(CaptureEvent),
    ) -> Result<CaptureStats, CaptureError> {
        let mut stats = CaptureStats {
            slices: 1,
            ..Default::default()
        };
        for packet in self.packets.drain(..) {
            stats.packets += 1;
            on_event(CaptureEvent::Packet(packet));
        }
        Ok(stats)
    }

    fn describe(&self) -> String {
        "vec".into()
    }
}

#[derive(Default)]
struct RecordingNotifier {
    seen: Mutex<Vec<(String, Value)>>,
}

impl RecordingNotifier {
    fn topics(&self, topic: &str) -> Vec<Value> {
        self.seen
            .lock()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn publish(&self, topic: &str, payload: Value) {
        self.seen.lock().push((topic.to_string(), payload));
    }
}

struct FailingStore;

impl EventStore for FailingStore {
    fn upsert_device(&self, _profile: &DeviceProfile) -> Result<(), PersistenceError> {
        Err(PersistenceError::backend("disk full"))
    }

    fn list_devices(&self) -> Result<Vec<DeviceProfile>, PersistenceError> {
        Ok(Vec::new())
    }

    fn insert_anomaly(&self, _event: &AnomalyEvent) -> Result<i64, PersistenceError> {
        Err(PersistenceError::backend("disk full"))
    }

    fn list_anomalies(&self, _limit: usize) -> Result<Vec<AnomalyRecord>, PersistenceError> {
        Ok(Vec::new())
    }
}

/// Writes through to SQLite, slowly.
struct SlowStore {
    inner: SqliteStore,
    delay: Duration,
}

impl EventStore for SlowStore {
    fn upsert_device(&self, profile: &DeviceProfile) -> Result<(), PersistenceError> {
        thread::sleep(self.delay);
        self.inner.upsert_device(profile)
    }

    fn list_devices(&self) -> Result<Vec<DeviceProfile>, PersistenceError> {
        self.inner.list_devices()
    }

    fn insert_anomaly(&self, event: &AnomalyEvent) -> Result<i64, PersistenceError> {
        self.inner.insert_anomaly(event)
    }

    fn list_anomalies(&self, limit: usize) -> Result<Vec<AnomalyRecord>, PersistenceError> {
        self.inner.list_anomalies(limit)
    }
}

fn offer_from(server: MacAddr, secs: i64) -> RawPacket {
    let body = dhcp::build_message(2, LAPTOP, &[(OPTION_MESSAGE_TYPE, &[2])]);
    let bytes = build::ipv4_udp(
        server,
        Ipv4Addr::new(192, 168, 1, 250),
        Ipv4Addr::BROADCAST,
        64,
        (DHCP_SERVER_PORT, DHCP_CLIENT_PORT),
        &body,
    );
    RawPacket::new(at(secs), bytes)
}

fn arp_from(mac: MacAddr, ip: Ipv4Addr, secs: i64) -> RawPacket {
    RawPacket::new(
        at(secs),
        build::arp(2, mac, ip, Ipv4Addr::new(192, 168, 1, 1)),
    )
}

fn config() -> LanwatchConfig {
    let mut config = LanwatchConfig::default();
    config.detection.trusted_dhcp_servers = vec![ROUTER.to_string()];
    config.core.event_bus.capacity = 64;
    config.core.event_bus.backpressure = BackpressurePolicy::Block;
    config
}

#[test]
fn replays_a_capture_end_to_end() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = Engine::from_config(
        &config(),
        store.clone(),
        notifier.clone(),
        MetricsRecorder::new(),
        false,
    )
    .unwrap();

    let mut source = VecSource {
        packets: vec![
            arp_from(LAPTOP, Ipv4Addr::new(192, 168, 1, 20), 0),
            offer_from(ROUTER, 1),
            offer_from(ROGUE, 2),
            offer_from(ROGUE, 3),
            RawPacket::new(at(4), vec![0u8; 5]),
            offer_from(ROGUE, 2 + 301),
        ],
    };
    let terminate = AtomicBool::new(false);
    let summary = engine.run(&mut source, &terminate).unwrap();

    assert_eq!(summary.capture.packets, 6);
    assert_eq!(summary.frames_processed, 5);
    assert_eq!(summary.frames_undecodable, 1);
    assert_eq!(summary.frames_dropped, 0);
    assert_eq!(summary.anomalies, 2);
    assert_eq!(summary.persistence_failures, 0);
    assert_eq!(summary.devices, 3);

    let alerts = store.list_anomalies(10).unwrap();
    assert_eq!(alerts.len(), 2);
    assert!(alerts.iter().all(|a| a.event.kind == AnomalyKind::RogueDhcp));
    assert_eq!(alerts[0].event.timestamp, at(303));
    assert!(alerts[0].event.timestamp - alerts[1].event.timestamp >= TimeDelta::seconds(300));

    let published = notifier.topics(TOPIC_ALERT);
    assert_eq!(published.len(), 2);
    assert_eq!(published[0]["kind"], "ROGUE_DHCP");
    assert_eq!(notifier.topics(TOPIC_DEVICE).len(), 3);
}

#[test]
fn failing_store_does_not_stop_detection() {
    let notifier = Arc::new(RecordingNotifier::default());
    let metrics = MetricsRecorder::new();
    let engine = Engine::from_config(
        &config(),
        Arc::new(FailingStore),
        notifier.clone(),
        metrics.clone(),
        false,
    )
    .unwrap();

    let ip = Ipv4Addr::new(192, 168, 1, 50);
    let mut source = VecSource {
        packets: vec![
            arp_from(LAPTOP, ip, 0),
            arp_from(ROGUE, ip, 1),
            offer_from(ROGUE, 2),
        ],
    };
    let summary = engine.run(&mut source, &AtomicBool::new(false)).unwrap();

    assert_eq!(summary.frames_processed, 3);
    assert_eq!(summary.anomalies, 2);
    // three failed upserts plus two failed anomaly inserts
    assert_eq!(summary.persistence_failures, 5);
    assert_eq!(metrics.persistence_errors.get(), 5);

    let kinds: Vec<Value> = notifier
        .topics(TOPIC_ALERT)
        .into_iter()
        .map(|v| v["kind"].clone())
        .collect();
    assert_eq!(kinds, vec![Value::from("ARP_SPOOF"), Value::from("ROGUE_DHCP")]);
}

#[test]
fn drop_oldest_keeps_processing_current() {
    let mut config = config();
    config.core.event_bus.backpressure = BackpressurePolicy::DropOldest;
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let engine = Engine::from_config(
        &config,
        store,
        Arc::new(BroadcastNotifier::default()),
        MetricsRecorder::new(),
        false,
    )
    .unwrap();

    let packets = (0..2_000)
        .map(|n| arp_from(LAPTOP, Ipv4Addr::new(192, 168, 1, 20), n))
        .collect();
    let summary = engine
        .run(&mut VecSource { packets }, &AtomicBool::new(false))
        .unwrap();

    assert_eq!(summary.frames_processed + summary.frames_dropped, 2_000);
    assert_eq!(summary.devices, 1);
}

#[test]
fn burst_counts_frames_dropped_from_the_bus() {
    let mut config = config();
    config.core.event_bus.backpressure = BackpressurePolicy::DropOldest;
    let store = Arc::new(SlowStore {
        inner: SqliteStore::in_memory().unwrap(),
        delay: Duration::from_millis(10),
    });
    let engine = Engine::from_config(
        &config,
        store.clone(),
        Arc::new(BroadcastNotifier::default()),
        MetricsRecorder::new(),
        false,
    )
    .unwrap();

    // 500 frames per second of capture time, far faster than the store.
    let packets = (0..600)
        .map(|n| {
            RawPacket::new(
                at(0) + TimeDelta::milliseconds(2 * n),
                build::arp(2, LAPTOP, Ipv4Addr::new(192, 168, 1, 20), Ipv4Addr::new(192, 168, 1, 1)),
            )
        })
        .collect();
    let summary = engine
        .run(&mut VecSource { packets }, &AtomicBool::new(false))
        .unwrap();

    assert!(summary.frames_dropped > 0);
    assert_eq!(summary.frames_processed + summary.frames_dropped, 600);
    let alerts = store.list_anomalies(10).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].event.kind, AnomalyKind::Burst);
    assert_eq!(alerts[0].event.description, "Traffic burst: 121 pkts/sec");
}
