//! Packet capture configuration.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(default)]
pub struct CaptureConfig {
    /// Interface to listen on. `None` picks the capture backend's default device.
    #[validate(custom(function = validation::validate_interface))]
    pub interface: Option<String>,

    /// Run in promiscuous mode?
    pub promiscuous: bool,

    /// Snapshot length in bytes.
    #[validate(range(min = 64, max = 65535))]
    pub snaplen: i32,

    /// pcap read timeout; must stay below the slice length.
    #[validate(range(min = 10, max = 5000))]
    pub read_timeout_ms: i32,

    /// Length of one capture slice. The stop flag is polled between slices.
    #[validate(range(min = 1, max = 60))]
    pub slice_secs: u64,

    /// Optional BPF filter expression.
    pub filter: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: None,
            promiscuous: true,
            snaplen: 2048,
            read_timeout_ms: 500,
            slice_secs: 5,
            filter: None,
        }
    }
}
