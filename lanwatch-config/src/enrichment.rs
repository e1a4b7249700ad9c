//! Vendor and hostname enrichment settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Disable to run fully offline.
    pub enabled: bool,

    /// OUI lookup endpoint; the separator-less MAC is appended.
    #[validate(url)]
    pub oui_lookup_url: String,

    #[validate(range(min = 1, max = 60))]
    pub vendor_timeout_secs: u64,

    #[validate(range(min = 10, max = 30_000))]
    pub hostname_timeout_ms: u64,
}

impl EnrichmentConfig {
    pub fn vendor_timeout(&self) -> Duration {
        Duration::from_secs(self.vendor_timeout_secs)
    }

    pub fn hostname_timeout(&self) -> Duration {
        Duration::from_millis(self.hostname_timeout_ms)
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            oui_lookup_url: "https://api.macvendors.com/".into(),
            vendor_timeout_secs: 5,
            hostname_timeout_ms: 2000,
        }
    }
}
