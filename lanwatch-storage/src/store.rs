use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::debug;

use lanwatch_core::error::PersistenceError;
use lanwatch_core::models::{
    AnomalyEvent, AnomalyKind, AnomalyRecord, DeviceProfile, OsGuess, UNKNOWN_VENDOR,
};
use lanwatch_core::sink::EventStore;

use crate::schema;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Incoming empty strings count as "no value"; `first_seen` is only ever
/// written by the insert; a placeholder vendor never replaces a real one.
const UPSERT_DEVICE: &str = r#"
    INSERT INTO devices (mac, ip, hostname, vendor, first_seen, last_seen, os_guess)
    VALUES (?1, ?2, NULLIF(?3, ''), NULLIF(?4, ''), ?5, ?6, NULLIF(?7, ''))
    ON CONFLICT(mac) DO UPDATE SET
        ip = excluded.ip,
        hostname = COALESCE(excluded.hostname, devices.hostname),
        vendor = CASE
            WHEN excluded.vendor IS NULL THEN devices.vendor
            WHEN excluded.vendor = ?8 AND devices.vendor IS NOT NULL THEN devices.vendor
            ELSE excluded.vendor
        END,
        os_guess = COALESCE(excluded.os_guess, devices.os_guess),
        last_seen = MAX(devices.last_seen, excluded.last_seen)
"#;

fn db_err(err: rusqlite::Error) -> PersistenceError {
    PersistenceError::backend(err)
}

fn corrupt(table: &'static str, reason: impl Into<String>) -> PersistenceError {
    PersistenceError::Corrupt {
        table,
        reason: reason.into(),
    }
}

fn from_millis(table: &'static str, ms: i64) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| corrupt(table, format!("bad timestamp {ms}")))
}

struct DeviceRow {
    mac: String,
    ip: String,
    hostname: Option<String>,
    vendor: Option<String>,
    first_seen: i64,
    last_seen: i64,
    os_guess: Option<String>,
}

impl TryFrom<DeviceRow> for DeviceProfile {
    type Error = PersistenceError;

    fn try_from(row: DeviceRow) -> Result<Self, Self::Error> {
        Ok(DeviceProfile {
            mac: row
                .mac
                .parse()
                .map_err(|e| corrupt("devices", format!("{e}")))?,
            ip: row
                .ip
                .parse()
                .map_err(|_| corrupt("devices", format!("bad ip '{}'", row.ip)))?,
            hostname: row.hostname,
            vendor: row.vendor,
            first_seen: from_millis("devices", row.first_seen)?,
            last_seen: from_millis("devices", row.last_seen)?,
            os_guess: row
                .os_guess
                .map(|g| g.parse::<OsGuess>())
                .transpose()
                .map_err(|e| corrupt("devices", e))?,
        })
    }
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    /// Opens (creating if needed) the database file and its tables.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path).map_err(db_err)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(db_err)?;
        Self::initialize(conn, path)
    }

    /// Creates an in-memory database (for testing)
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize(conn, PathBuf::from(":memory:"))
    }

    fn initialize(conn: Connection, path: PathBuf) -> Result<Self, PersistenceError> {
        schema::create_tables(&conn).map_err(db_err)?;
        debug!(path = %path.display(), "Storage ready");
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventStore for SqliteStore {
    fn upsert_device(&self, profile: &DeviceProfile) -> Result<(), PersistenceError> {
        let conn = self.conn.lock();
        conn.execute(
            UPSERT_DEVICE,
            params![
                profile.mac.to_string(),
                profile.ip.to_string(),
                profile.hostname,
                profile.vendor,
                profile.first_seen.timestamp_millis(),
                profile.last_seen.timestamp_millis(),
                profile.os_guess.map(|g| g.as_str()),
                UNKNOWN_VENDOR,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn list_devices(&self) -> Result<Vec<DeviceProfile>, PersistenceError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT mac, ip, hostname, vendor, first_seen, last_seen, os_guess
                 FROM devices ORDER BY mac",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DeviceRow {
                    mac: row.get(0)?,
                    ip: row.get(1)?,
                    hostname: row.get(2)?,
                    vendor: row.get(3)?,
                    first_seen: row.get(4)?,
                    last_seen: row.get(5)?,
                    os_guess: row.get(6)?,
                })
            })
            .map_err(db_err)?;

        rows.map(|row| row.map_err(db_err).and_then(DeviceProfile::try_from))
            .collect()
    }

    fn insert_anomaly(&self, event: &AnomalyEvent) -> Result<i64, PersistenceError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO anomalies (ts, type, description, dedup_key) VALUES (?1, ?2, ?3, ?4)",
            params![
                event.timestamp.timestamp_millis(),
                event.kind.as_str(),
                event.description,
                event.dedup_key,
            ],
        )
        .map_err(db_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn list_anomalies(&self, limit: usize) -> Result<Vec<AnomalyRecord>, PersistenceError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, ts, type, description, dedup_key
                 FROM anomalies ORDER BY ts DESC, id DESC LIMIT ?1",
            )
            .map_err(db_err)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map([limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(db_err)?;

        rows.map(|row| {
            let (id, ts, kind, description, dedup_key) = row.map_err(db_err)?;
            Ok(AnomalyRecord {
                id,
                event: AnomalyEvent {
                    timestamp: from_millis("anomalies", ts)?,
                    kind: kind
                        .parse::<AnomalyKind>()
                        .map_err(|e| corrupt("anomalies", e))?,
                    description,
                    dedup_key,
                },
            })
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lanwatch_protocols::MacAddr;
    use std::net::Ipv4Addr;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn mac(last: u8) -> MacAddr {
        MacAddr::new([0x00, 0x1a, 0x2b, 0x3c, 0x4d, last])
    }

    fn anomaly(kind: AnomalyKind, secs: i64) -> AnomalyEvent {
        AnomalyEvent {
            timestamp: at(secs),
            kind,
            description: format!("{kind} at {secs}"),
            dedup_key: kind.as_str().to_lowercase(),
        }
    }

    #[test]
    fn sticky_upsert_keeps_enrichment_and_takes_new_ip() {
        let store = SqliteStore::in_memory().unwrap();
        let mut first = DeviceProfile::new(mac(1), Ipv4Addr::new(10, 0, 0, 2), at(0));
        first.hostname = Some("nas.lan".into());
        first.vendor = Some("Synology".into());
        first.os_guess = Some(OsGuess::LinuxUnix);
        store.upsert_device(&first).unwrap();

        let mut second = DeviceProfile::new(mac(1), Ipv4Addr::new(10, 0, 0, 7), at(60));
        second.hostname = Some(String::new());
        second.vendor = Some(UNKNOWN_VENDOR.into());
        store.upsert_device(&second).unwrap();

        let devices = store.list_devices().unwrap();
        assert_eq!(devices.len(), 1);
        let stored = &devices[0];
        assert_eq!(stored.ip, Ipv4Addr::new(10, 0, 0, 7));
        assert_eq!(stored.hostname.as_deref(), Some("nas.lan"));
        assert_eq!(stored.vendor.as_deref(), Some("Synology"));
        assert_eq!(stored.os_guess, Some(OsGuess::LinuxUnix));
        assert_eq!(stored.first_seen, at(0));
        assert_eq!(stored.last_seen, at(60));
    }

    #[test]
    fn first_seen_and_last_seen_are_guarded() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .upsert_device(&DeviceProfile::new(mac(1), Ipv4Addr::new(10, 0, 0, 2), at(100)))
            .unwrap();
        store
            .upsert_device(&DeviceProfile::new(mac(1), Ipv4Addr::new(10, 0, 0, 2), at(50)))
            .unwrap();

        let stored = &store.list_devices().unwrap()[0];
        assert_eq!(stored.first_seen, at(100));
        assert_eq!(stored.last_seen, at(100));
    }

    #[test]
    fn unknown_vendor_is_replaced_once_resolved() {
        let store = SqliteStore::in_memory().unwrap();
        let mut profile = DeviceProfile::new(mac(1), Ipv4Addr::new(10, 0, 0, 2), at(0));
        profile.vendor = Some(UNKNOWN_VENDOR.into());
        store.upsert_device(&profile).unwrap();
        profile.vendor = Some("Ubiquiti Inc".into());
        store.upsert_device(&profile).unwrap();

        assert_eq!(
            store.list_devices().unwrap()[0].vendor.as_deref(),
            Some("Ubiquiti Inc")
        );
    }

    #[test]
    fn devices_are_ordered_by_mac() {
        let store = SqliteStore::in_memory().unwrap();
        for last in [9u8, 1, 5] {
            store
                .upsert_device(&DeviceProfile::new(mac(last), Ipv4Addr::new(10, 0, 0, last), at(0)))
                .unwrap();
        }
        let order: Vec<MacAddr> = store.list_devices().unwrap().iter().map(|d| d.mac).collect();
        assert_eq!(order, vec![mac(1), mac(5), mac(9)]);
    }

    #[test]
    fn anomalies_newest_first_with_limit() {
        let store = SqliteStore::in_memory().unwrap();
        let first_id = store.insert_anomaly(&anomaly(AnomalyKind::Burst, 10)).unwrap();
        store.insert_anomaly(&anomaly(AnomalyKind::ArpSpoof, 30)).unwrap();
        store.insert_anomaly(&anomaly(AnomalyKind::RogueDhcp, 20)).unwrap();

        let all = store.list_anomalies(100).unwrap();
        let kinds: Vec<AnomalyKind> = all.iter().map(|r| r.event.kind).collect();
        assert_eq!(
            kinds,
            vec![AnomalyKind::ArpSpoof, AnomalyKind::RogueDhcp, AnomalyKind::Burst]
        );
        assert_eq!(all[2].id, first_id);
        assert_eq!(all[0].event.dedup_key, "arp_spoof");

        assert_eq!(store.list_anomalies(1).unwrap().len(), 1);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lanwatch.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .upsert_device(&DeviceProfile::new(mac(1), Ipv4Addr::new(10, 0, 0, 2), at(0)))
                .unwrap();
            store.insert_anomaly(&anomaly(AnomalyKind::MacClone, 5)).unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.list_devices().unwrap().len(), 1);
        assert_eq!(reopened.list_anomalies(10).unwrap()[0].event.kind, AnomalyKind::MacClone);
    }
}
