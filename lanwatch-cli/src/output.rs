//! Console rendering for stored records and live notifications.

use std::io::Write;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;

use lanwatch_core::models::{AnomalyEvent, AnomalyRecord, DeviceChange, DeviceProfile, DeviceUpdate};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Alerts younger than this count against the score.
pub const SCORE_WINDOW_SECS: i64 = 600;
const SCORE_PENALTY: u32 = 10;
/// Recent alerts that bring the score to zero.
pub const SCORE_FLOOR_ALERTS: usize = 10;

fn stamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIME_FORMAT).to_string()
}

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

pub fn alert_line(payload: &Value) -> Option<String> {
    let event: AnomalyEvent = serde_json::from_value(payload.clone()).ok()?;
    Some(format!(
        "[{}] {} - {}",
        stamp(&event.timestamp),
        event.kind,
        event.description
    ))
}

pub fn device_line(payload: &Value) -> Option<String> {
    let update: DeviceUpdate = serde_json::from_value(payload.clone()).ok()?;
    let device = &update.profile;
    match update.change {
        DeviceChange::New => Some(format!(
            "[+] {} {} {}",
            device.mac,
            device.ip,
            or_dash(device.vendor.as_deref())
        )),
        DeviceChange::IpChanged => Some(format!("[~] {} now at {}", device.mac, device.ip)),
        DeviceChange::Refreshed => None,
    }
}

pub fn device_table(out: &mut impl Write, devices: &[DeviceProfile]) -> std::io::Result<()> {
    writeln!(
        out,
        "{:17}  {:15}  {:16}  {:24}  {:10}  LAST SEEN",
        "MAC", "IP", "VENDOR", "HOSTNAME", "OS"
    )?;
    for d in devices {
        writeln!(
            out,
            "{:17}  {:15}  {:16.16}  {:24}  {:10}  {}",
            d.mac.to_string(),
            d.ip.to_string(),
            or_dash(d.vendor.as_deref()),
            or_dash(d.hostname.as_deref()),
            d.os_guess.map_or("-", |g| g.as_str()),
            stamp(&d.last_seen)
        )?;
    }
    Ok(())
}

pub fn alert_table(out: &mut impl Write, alerts: &[AnomalyRecord]) -> std::io::Result<()> {
    for record in alerts {
        let event = &record.event;
        writeln!(
            out,
            "[{}] {} - {}",
            stamp(&event.timestamp),
            event.kind,
            event.description
        )?;
    }
    Ok(())
}

/// 100 minus 10 for each alert in the last [`SCORE_WINDOW_SECS`], never
/// below zero.
pub fn security_score(alerts: &[AnomalyRecord], now: DateTime<Utc>) -> u32 {
    let since = now - TimeDelta::seconds(SCORE_WINDOW_SECS);
    let recent = alerts
        .iter()
        .filter(|a| a.event.timestamp > since)
        .count()
        .min(SCORE_FLOOR_ALERTS) as u32;
    100 - recent * SCORE_PENALTY
}

pub fn export_json(mut out: impl Write, devices: &[DeviceProfile]) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut out, devices)?;
    writeln!(out)?;
    Ok(())
}

pub fn export_csv(out: impl Write, devices: &[DeviceProfile]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for device in devices {
        writer.serialize(device)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lanwatch_core::models::{AnomalyKind, OsGuess};
    use lanwatch_protocols::MacAddr;
    use std::net::Ipv4Addr;

    fn device() -> DeviceProfile {
        let seen = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let mut d = DeviceProfile::new(
            MacAddr::new([0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e]),
            Ipv4Addr::new(192, 168, 1, 20),
            seen,
        );
        d.vendor = Some("Raspberry Pi Trading Ltd".into());
        d.os_guess = Some(OsGuess::LinuxUnix);
        d
    }

    #[test]
    fn device_rows_truncate_vendor_and_dash_missing_fields() {
        let mut buf = Vec::new();
        device_table(&mut buf, &[device()]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.starts_with("00:1a:2b:3c:4d:5e  192.168.1.20   "));
        assert!(row.contains("Raspberry Pi Tra  -"));
        assert!(row.contains("Linux/Unix"));
        assert!(row.ends_with("2024-03-01 12:30:00"));
    }

    #[test]
    fn csv_export_has_header_and_one_row_per_device() {
        let mut buf = Vec::new();
        export_csv(&mut buf, &[device()]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("mac,ip,hostname,vendor,first_seen,last_seen,os_guess")
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("00:1a:2b:3c:4d:5e,192.168.1.20,,Raspberry Pi Trading Ltd,"));
        assert!(row.ends_with(",Linux/Unix"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn json_export_is_an_array() {
        let mut buf = Vec::new();
        export_json(&mut buf, &[device()]).unwrap();
        let parsed: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed[0]["mac"], "00:1a:2b:3c:4d:5e");
        assert_eq!(parsed[0]["os_guess"], "Linux/Unix");
    }

    #[test]
    fn alert_notifications_render_as_one_line() {
        let event = AnomalyEvent {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 5).unwrap(),
            kind: AnomalyKind::RogueDhcp,
            description: "Rogue DHCP OFFER from MAC 00:1a:2b:3c:4d:66".into(),
            dedup_key: "rogue_00:1a:2b:3c:4d:66".into(),
        };
        let line = alert_line(&serde_json::to_value(&event).unwrap()).unwrap();
        assert_eq!(
            line,
            "[2024-03-01 12:00:05] ROGUE_DHCP - Rogue DHCP OFFER from MAC 00:1a:2b:3c:4d:66"
        );
        assert_eq!(alert_line(&Value::Null), None);
    }

    fn alert_at(id: i64, ts: DateTime<Utc>) -> AnomalyRecord {
        AnomalyRecord {
            id,
            event: AnomalyEvent {
                timestamp: ts,
                kind: AnomalyKind::Burst,
                description: "Traffic burst: 150 pkts/sec".into(),
                dedup_key: "burst".into(),
            },
        }
    }

    #[test]
    fn score_counts_only_the_last_ten_minutes() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(security_score(&[], now), 100);

        let alerts = vec![
            alert_at(3, now - TimeDelta::seconds(5)),
            alert_at(2, now - TimeDelta::seconds(599)),
            alert_at(1, now - TimeDelta::seconds(600)),
        ];
        assert_eq!(security_score(&alerts, now), 80);

        let flood: Vec<_> = (0..15).map(|i| alert_at(i, now - TimeDelta::seconds(i))).collect();
        assert_eq!(security_score(&flood, now), 0);
    }

    #[test]
    fn refreshed_devices_are_not_printed() {
        let update = DeviceUpdate {
            change: DeviceChange::Refreshed,
            profile: device(),
        };
        assert_eq!(device_line(&serde_json::to_value(&update).unwrap()), None);

        let update = DeviceUpdate {
            change: DeviceChange::New,
            ..update
        };
        assert_eq!(
            device_line(&serde_json::to_value(&update).unwrap()).as_deref(),
            Some("[+] 00:1a:2b:3c:4d:5e 192.168.1.20 Raspberry Pi Trading Ltd")
        );
    }
}
