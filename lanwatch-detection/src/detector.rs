//! ## lanwatch-detection::detector
//! **Fixed-priority rule engine with per-key cooldowns**
//!
//! Rules, in priority order:
//! - `BURST`: more than `burst_threshold` frames in the trailing second
//! - `ARP_SPOOF`: more than `arp_spoof_max_macs` macs claiming one ip
//! - `MAC_CLONE`: more than `mac_clone_max_ips` IPv4 sources behind one mac
//! - `ROGUE_DHCP`: a DHCP OFFER from a mac outside the trusted set
//!
//! The burst count can be supplied by the caller when frames are counted
//! upstream of a lossy queue; see [`AnomalyDetector::detect_counted`].
//!
//! Every rule updates its evidence on every frame it applies to. Emission
//! then walks the matching rules in order; a rule whose key is cooling down
//! is skipped and the next one gets its chance.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tracing::trace;

use lanwatch_config::DetectionConfig;
use lanwatch_core::models::{AnomalyEvent, AnomalyKind};
use lanwatch_protocols::{Frame, MacAddr};

use crate::burst::BurstWindow;
use crate::cooldown::CooldownTracker;
use crate::witness::WitnessTable;

/// How often (in frame time) stale witnesses and cooldowns are swept.
const SWEEP_INTERVAL_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("{name} of {value:?} is out of range")]
    InvalidDuration { name: &'static str, value: Duration },

    #[error(
        "max_witnesses_per_key ({per_key}) must exceed both arp_spoof_max_macs and mac_clone_max_ips ({limit})"
    )]
    WitnessCapacity { per_key: usize, limit: usize },
}

#[derive(Debug, Clone, Copy)]
struct Cooldowns {
    burst: TimeDelta,
    arp_spoof: TimeDelta,
    mac_clone: TimeDelta,
    rogue_dhcp: TimeDelta,
}

impl Cooldowns {
    fn for_kind(&self, kind: AnomalyKind) -> TimeDelta {
        match kind {
            AnomalyKind::Burst => self.burst,
            AnomalyKind::ArpSpoof => self.arp_spoof,
            AnomalyKind::MacClone => self.mac_clone,
            AnomalyKind::RogueDhcp => self.rogue_dhcp,
        }
    }

    fn longest(&self) -> TimeDelta {
        self.burst
            .max(self.arp_spoof)
            .max(self.mac_clone)
            .max(self.rogue_dhcp)
    }
}

/// Sizes of the detector's internal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorState {
    pub burst_window: usize,
    pub arp_claims: usize,
    pub mac_sources: usize,
    pub cooldowns: usize,
}

/// A rule whose trigger holds for the current frame.
struct Candidate {
    kind: AnomalyKind,
    description: String,
    dedup_key: String,
}

pub struct AnomalyDetector {
    burst: BurstWindow,
    burst_threshold: usize,
    /// ip → macs claiming it in ARP.
    arp_claims: WitnessTable<Ipv4Addr, MacAddr>,
    arp_max_macs: usize,
    /// mac → IPv4 source addresses sent from it.
    mac_sources: WitnessTable<MacAddr, Ipv4Addr>,
    mac_max_ips: usize,
    trusted_dhcp: HashSet<MacAddr>,
    cooldowns: Cooldowns,
    suppression: CooldownTracker,
    report_all: bool,
    last_sweep: Option<DateTime<Utc>>,
}

fn delta(name: &'static str, value: Duration) -> Result<TimeDelta, DetectionError> {
    TimeDelta::from_std(value).map_err(|_| DetectionError::InvalidDuration { name, value })
}

impl AnomalyDetector {
    pub fn new(config: &DetectionConfig) -> Result<Self, DetectionError> {
        let limit = config.arp_spoof_max_macs.max(config.mac_clone_max_ips);
        if config.max_witnesses_per_key <= limit {
            return Err(DetectionError::WitnessCapacity {
                per_key: config.max_witnesses_per_key,
                limit,
            });
        }

        let cooldowns = Cooldowns {
            burst: delta("burst_cooldown", config.burst_cooldown())?,
            arp_spoof: delta("arp_spoof_cooldown", config.arp_spoof_cooldown())?,
            mac_clone: delta("mac_clone_cooldown", config.mac_clone_cooldown())?,
            rogue_dhcp: delta("rogue_dhcp_cooldown", config.rogue_dhcp_cooldown())?,
        };
        let ttl = delta("witness_ttl", config.witness_ttl())?;

        Ok(Self {
            burst: BurstWindow::new(config.burst_threshold),
            burst_threshold: config.burst_threshold,
            arp_claims: WitnessTable::new(
                ttl,
                config.max_tracked_keys,
                config.max_witnesses_per_key,
            ),
            arp_max_macs: config.arp_spoof_max_macs,
            mac_sources: WitnessTable::new(
                ttl,
                config.max_tracked_keys,
                config.max_witnesses_per_key,
            ),
            mac_max_ips: config.mac_clone_max_ips,
            trusted_dhcp: config.trusted_macs().into_iter().collect(),
            suppression: CooldownTracker::new(cooldowns.longest(), config.max_tracked_keys),
            cooldowns,
            report_all: config.report_all_matches,
            last_sweep: None,
        })
    }

    /// Evaluates one frame and returns the first rule that emits, if any.
    pub fn evaluate(&mut self, frame: &Frame, now: DateTime<Utc>) -> Option<AnomalyEvent> {
        self.run_rules(frame, now, None, true).into_iter().next()
    }

    /// Evaluates one frame and returns every rule that emits.
    pub fn evaluate_all(&mut self, frame: &Frame, now: DateTime<Utc>) -> Vec<AnomalyEvent> {
        self.run_rules(frame, now, None, false)
    }

    /// [`evaluate`](Self::evaluate) or [`evaluate_all`](Self::evaluate_all),
    /// as configured by `report_all_matches`.
    pub fn detect(&mut self, frame: &Frame, now: DateTime<Utc>) -> Vec<AnomalyEvent> {
        self.run_rules(frame, now, None, !self.report_all)
    }

    /// Like [`detect`](Self::detect), but with the trailing-second frame
    /// count taken from `frames_last_second` when present instead of the
    /// detector's own window.
    pub fn detect_counted(
        &mut self,
        frame: &Frame,
        now: DateTime<Utc>,
        frames_last_second: Option<usize>,
    ) -> Vec<AnomalyEvent> {
        self.run_rules(frame, now, frames_last_second, !self.report_all)
    }

    /// An empty window sized for this detector's burst threshold.
    pub fn burst_window(&self) -> BurstWindow {
        BurstWindow::new(self.burst_threshold)
    }

    pub fn state(&self) -> DetectorState {
        DetectorState {
            burst_window: self.burst.len(),
            arp_claims: self.arp_claims.len(),
            mac_sources: self.mac_sources.len(),
            cooldowns: self.suppression.len(),
        }
    }

    fn run_rules(
        &mut self,
        frame: &Frame,
        now: DateTime<Utc>,
        counted: Option<usize>,
        first_only: bool,
    ) -> Vec<AnomalyEvent> {
        self.sweep_if_due(now);

        let candidates = [
            self.check_burst(now, counted),
            self.check_arp_spoof(frame, now),
            self.check_mac_clone(frame, now),
            self.check_rogue_dhcp(frame),
        ];

        let mut emitted = Vec::new();
        for candidate in candidates.into_iter().flatten() {
            let cooldown = self.cooldowns.for_kind(candidate.kind);
            if !self.suppression.try_acquire(&candidate.dedup_key, cooldown, now) {
                trace!(
                    kind = %candidate.kind,
                    key = %candidate.dedup_key,
                    "Anomaly suppressed by cooldown"
                );
                continue;
            }
            emitted.push(AnomalyEvent {
                timestamp: now,
                kind: candidate.kind,
                description: candidate.description,
                dedup_key: candidate.dedup_key,
            });
            if first_only {
                break;
            }
        }
        emitted
    }

    fn check_burst(&mut self, now: DateTime<Utc>, counted: Option<usize>) -> Option<Candidate> {
        let count = counted.unwrap_or_else(|| self.burst.record(now));
        trace!(count, "Burst window updated");
        (count > self.burst_threshold).then(|| Candidate {
            kind: AnomalyKind::Burst,
            description: format!("Traffic burst: {count} pkts/sec"),
            dedup_key: "burst".to_string(),
        })
    }

    fn check_arp_spoof(&mut self, frame: &Frame, now: DateTime<Utc>) -> Option<Candidate> {
        let arp = frame.arp.as_ref()?;
        if arp.psrc.is_unspecified() {
            return None;
        }
        let distinct = self.arp_claims.record(arp.psrc, arp.hwsrc, now);
        if distinct <= self.arp_max_macs {
            return None;
        }
        let macs = join(&self.arp_claims.witnesses(&arp.psrc));
        Some(Candidate {
            kind: AnomalyKind::ArpSpoof,
            description: format!("Multiple MACs ({macs}) detected for IP {}", arp.psrc),
            dedup_key: format!("arp_{}", arp.psrc),
        })
    }

    fn check_mac_clone(&mut self, frame: &Frame, now: DateTime<Utc>) -> Option<Candidate> {
        let ip = frame.ipv4.as_ref()?;
        if ip.source.is_unspecified() {
            return None;
        }
        let mac = frame.source_mac();
        let distinct = self.mac_sources.record(mac, ip.source, now);
        if distinct <= self.mac_max_ips {
            return None;
        }
        let ips = join(&self.mac_sources.witnesses(&mac));
        Some(Candidate {
            kind: AnomalyKind::MacClone,
            description: format!("MAC {mac} used by multiple IPs: {ips}"),
            dedup_key: format!("mac_{mac}"),
        })
    }

    fn check_rogue_dhcp(&self, frame: &Frame) -> Option<Candidate> {
        let dhcp = frame.dhcp.as_ref()?;
        let mac = frame.source_mac();
        if !dhcp.is_offer() || self.trusted_dhcp.contains(&mac) {
            return None;
        }
        Some(Candidate {
            kind: AnomalyKind::RogueDhcp,
            description: format!("Rogue DHCP OFFER from MAC {mac}"),
            dedup_key: format!("rogue_{mac}"),
        })
    }

    fn sweep_if_due(&mut self, now: DateTime<Utc>) {
        let due = match self.last_sweep {
            None => {
                self.last_sweep = Some(now);
                false
            }
            Some(last) => now - last >= TimeDelta::seconds(SWEEP_INTERVAL_SECS),
        };
        if due {
            let arp = self.arp_claims.purge_expired(now);
            let mac = self.mac_sources.purge_expired(now);
            let cooldowns = self.suppression.prune(now);
            trace!(arp, mac, cooldowns, "Detector state swept");
            self.last_sweep = Some(now);
        }
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
