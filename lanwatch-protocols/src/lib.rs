//! # Lanwatch Protocol Decoders
//!
//! Turns raw captured bytes into a [`Frame`]: the Ethernet header plus
//! whichever ARP, IPv4, UDP and DHCP views the frame carries. Only the fields
//! the inventory and the anomaly rules read are decoded; payloads beyond DHCP
//! options are never inspected.

pub mod arp;
pub mod dhcp;
pub mod error;
pub mod frame;
pub mod mac;

pub use arp::ArpView;
pub use dhcp::{DhcpMessageType, DhcpOption, DhcpView};
pub use error::DecodeError;
pub use frame::{EthernetView, Frame, Ipv4View, UdpView};
pub use mac::{MacAddr, MacParseError};
