//! Rule thresholds, cooldowns and state bounds for the anomaly detector.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use lanwatch_protocols::MacAddr;

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(default)]
pub struct DetectionConfig {
    /// Packets in the trailing second above which BURST fires.
    #[validate(range(min = 1, max = 10_000_000))]
    pub burst_threshold: usize,

    #[validate(range(max = 86400))]
    pub burst_cooldown_secs: u64,

    #[validate(range(max = 86400))]
    pub arp_spoof_cooldown_secs: u64,

    #[validate(range(max = 86400))]
    pub mac_clone_cooldown_secs: u64,

    #[validate(range(max = 86400))]
    pub rogue_dhcp_cooldown_secs: u64,

    /// Distinct macs allowed to claim one ip.
    #[validate(range(min = 1, max = 1024))]
    pub arp_spoof_max_macs: usize,

    /// Distinct ips allowed from one mac.
    #[validate(range(min = 1, max = 1024))]
    pub mac_clone_max_ips: usize,

    /// MACs allowed to send DHCP OFFERs.
    #[validate(custom(function = validation::validate_mac_list))]
    pub trusted_dhcp_servers: Vec<String>,

    /// Witnesses not seen again within this window stop counting.
    #[validate(range(min = 1, max = 31_536_000))]
    pub witness_ttl_secs: u64,

    #[validate(range(min = 16, max = 16_777_216))]
    pub max_tracked_keys: usize,

    #[validate(range(min = 2, max = 4096))]
    pub max_witnesses_per_key: usize,

    /// Emit every matching rule per frame instead of the first one.
    pub report_all_matches: bool,
}

impl DetectionConfig {
    /// Normalized trusted DHCP server macs. Entries that fail to parse are
    /// skipped; validation rejects them before this is reached.
    pub fn trusted_macs(&self) -> Vec<MacAddr> {
        self.trusted_dhcp_servers
            .iter()
            .filter_map(|raw| raw.parse().ok())
            .collect()
    }

    pub fn burst_cooldown(&self) -> Duration {
        Duration::from_secs(self.burst_cooldown_secs)
    }

    pub fn arp_spoof_cooldown(&self) -> Duration {
        Duration::from_secs(self.arp_spoof_cooldown_secs)
    }

    pub fn mac_clone_cooldown(&self) -> Duration {
        Duration::from_secs(self.mac_clone_cooldown_secs)
    }

    pub fn rogue_dhcp_cooldown(&self) -> Duration {
        Duration::from_secs(self.rogue_dhcp_cooldown_secs)
    }

    pub fn witness_ttl(&self) -> Duration {
        Duration::from_secs(self.witness_ttl_secs)
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            burst_threshold: 120,
            burst_cooldown_secs: 10,
            arp_spoof_cooldown_secs: 180,
            mac_clone_cooldown_secs: 300,
            rogue_dhcp_cooldown_secs: 300,
            arp_spoof_max_macs: 1,
            mac_clone_max_ips: 3,
            trusted_dhcp_servers: Vec::new(),
            witness_ttl_secs: 86_400,
            max_tracked_keys: 65_536,
            max_witnesses_per_key: 64,
            report_all_matches: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trusted_macs_are_normalized() {
        let config = DetectionConfig {
            trusted_dhcp_servers: vec!["00-1A-2B-3C-4D-5E".into(), "001a2b3c4d5f".into()],
            ..Default::default()
        };
        config.validate().unwrap();
        let rendered: Vec<String> = config.trusted_macs().iter().map(|m| m.to_string()).collect();
        assert_eq!(rendered, ["00:1a:2b:3c:4d:5e", "00:1a:2b:3c:4d:5f"]);
    }

    #[test]
    fn rejects_bad_trusted_mac_and_zero_threshold() {
        let config = DetectionConfig {
            trusted_dhcp_servers: vec!["router".into()],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DetectionConfig {
            burst_threshold: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
