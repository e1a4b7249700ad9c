//! # Lanwatch Device Inventory
//!
//! Keeps one [`DeviceProfile`](lanwatch_core::models::DeviceProfile) per mac,
//! enriches new devices with a vendor and a hostname, and writes every
//! observation through to the [`EventStore`](lanwatch_core::sink::EventStore).

pub mod enrich;
pub mod error;
pub mod registry;

pub use enrich::{
    HostnameLookup, MacVendorsClient, NoHostnameLookup, NoVendorLookup, ReverseDns, VendorLookup,
    RANDOMIZED_VENDOR,
};
pub use error::EnrichmentError;
pub use registry::DeviceRegistry;
