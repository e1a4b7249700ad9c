//! lanwatch‑capture
//!
//! Packet sources for the monitor. [`LiveSource`] reads an interface in
//! fixed time slices so a stop request is noticed between slices;
//! [`ReplaySource`] reads a pcap file to the end. Both hand raw frames to
//! the caller through the [`PacketSource`] trait and never decode them.

pub mod error;
pub mod live;
pub mod packet;
pub mod replay;
pub mod source;

pub use error::{CaptureError, StartupError};
pub use live::{available_interfaces, validate_interface, LiveSource};
pub use packet::RawPacket;
pub use replay::ReplaySource;
pub use source::{CaptureEvent, CaptureStats, PacketSource};
