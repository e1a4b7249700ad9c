//! # Lanwatch Detection Engine
//!
//! Rule-based anomaly detection over decoded frames: traffic bursts, ARP
//! spoofing, MAC cloning and rogue DHCP servers. All state is owned by one
//! [`AnomalyDetector`] and touched from a single thread.

pub mod burst;
pub mod cooldown;
pub mod detector;
pub mod witness;

pub use burst::BurstWindow;
pub use cooldown::CooldownTracker;
pub use detector::{AnomalyDetector, DetectionError, DetectorState};
pub use witness::WitnessTable;
