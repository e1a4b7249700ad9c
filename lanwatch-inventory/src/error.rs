use std::net::Ipv4Addr;
use std::time::Duration;

use lanwatch_protocols::MacAddr;
use thiserror::Error;

/// Why an enrichment lookup produced nothing. Never fatal.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("vendor lookup for {mac} failed: {source}")]
    Http {
        mac: MacAddr,
        #[source]
        source: reqwest::Error,
    },

    #[error("vendor lookup for {mac} returned HTTP {status}")]
    Status { mac: MacAddr, status: u16 },

    #[error("vendor lookup for {mac} returned an empty body")]
    EmptyBody { mac: MacAddr },

    #[error("reverse lookup for {ip} failed: {source}")]
    Dns {
        ip: Ipv4Addr,
        #[source]
        source: std::io::Error,
    },

    #[error("reverse lookup for {ip} timed out after {timeout:?}")]
    Timeout { ip: Ipv4Addr, timeout: Duration },

    #[error("reverse lookup for {ip} skipped: {limit} lookups already pending")]
    Saturated { ip: Ipv4Addr, limit: usize },
}
