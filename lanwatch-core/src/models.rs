//! ## lanwatch-core::models
//! Records produced by the inventory and the rule engine.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lanwatch_protocols::{Frame, MacAddr};

/// Vendor label used when no lookup ever succeeded for a mac.
pub const UNKNOWN_VENDOR: &str = "Unknown";

/// Coarse operating system family derived from the IPv4 TTL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OsGuess {
    #[serde(rename = "Windows")]
    Windows,
    #[serde(rename = "Linux/Unix")]
    LinuxUnix,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl OsGuess {
    /// Initial TTL heuristic: Windows starts at 128, most Unix stacks at 64.
    pub fn from_ttl(ttl: u8) -> Self {
        match ttl {
            128..=u8::MAX => Self::Windows,
            64..=127 => Self::LinuxUnix,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Windows => "Windows",
            Self::LinuxUnix => "Linux/Unix",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for OsGuess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OsGuess {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Windows" => Ok(Self::Windows),
            "Linux/Unix" => Ok(Self::LinuxUnix),
            "Unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown os guess '{other}'")),
        }
    }
}

/// One inventory entry, keyed by normalized mac.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub hostname: Option<String>,
    pub vendor: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub os_guess: Option<OsGuess>,
}

impl DeviceProfile {
    pub fn new(mac: MacAddr, ip: Ipv4Addr, seen: DateTime<Utc>) -> Self {
        Self {
            mac,
            ip,
            hostname: None,
            vendor: None,
            first_seen: seen,
            last_seen: seen,
            os_guess: None,
        }
    }

    /// Applies a newer observation of the same device.
    ///
    /// Empty incoming fields keep the stored value, `first_seen` is never
    /// touched and `last_seen` never moves backwards.
    pub fn merge(&mut self, newer: DeviceProfile) {
        debug_assert_eq!(self.mac, newer.mac);
        self.ip = newer.ip;
        if let Some(hostname) = newer.hostname.filter(|h| !h.is_empty()) {
            self.hostname = Some(hostname);
        }
        match newer.vendor.filter(|v| !v.is_empty()) {
            Some(v) if v == UNKNOWN_VENDOR && self.vendor.is_some() => {}
            Some(v) => self.vendor = Some(v),
            None => {}
        }
        if newer.os_guess.is_some() {
            self.os_guess = newer.os_guess;
        }
        self.last_seen = self.last_seen.max(newer.last_seen);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    Burst,
    ArpSpoof,
    MacClone,
    RogueDhcp,
}

impl AnomalyKind {
    pub const ALL: [AnomalyKind; 4] = [
        AnomalyKind::Burst,
        AnomalyKind::ArpSpoof,
        AnomalyKind::MacClone,
        AnomalyKind::RogueDhcp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Burst => "BURST",
            Self::ArpSpoof => "ARP_SPOOF",
            Self::MacClone => "MAC_CLONE",
            Self::RogueDhcp => "ROGUE_DHCP",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnomalyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown anomaly kind '{s}'"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: AnomalyKind,
    pub description: String,
    /// Cooldown scope, e.g. `arp_10.0.0.5`.
    pub dedup_key: String,
}

/// A persisted anomaly with its storage id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub id: i64,
    #[serde(flatten)]
    pub event: AnomalyEvent,
}

/// A decoded frame together with its capture timestamp.
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    pub timestamp: DateTime<Utc>,
    pub frame: Frame,
    /// Frames captured in the trailing second, this one included, counted
    /// before the frame was queued. `None` leaves the count to the detector.
    pub frames_last_second: Option<usize>,
}

impl CapturedFrame {
    pub fn new(timestamp: DateTime<Utc>, frame: Frame) -> Self {
        Self {
            timestamp,
            frame,
            frames_last_second: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceChange {
    /// First sighting of this mac.
    New,
    /// Known mac with a different ip.
    IpChanged,
    /// Known mac, same ip; only timestamps or enrichment moved.
    Refreshed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceUpdate {
    pub change: DeviceChange,
    pub profile: DeviceProfile,
}
