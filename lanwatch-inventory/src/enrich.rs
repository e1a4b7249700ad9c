//! ## lanwatch-inventory::enrich
//! Best-effort vendor and hostname resolution.
//!
//! Both lookups block, so the registry only calls them for new devices or
//! when a device changes ip, and caches what they return. Failures are logged at `debug` and reported as
//! absent.

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel;
use dns_lookup::lookup_addr;
use parking_lot::Mutex;
use reqwest::blocking::Client;
use tracing::debug;

use lanwatch_protocols::MacAddr;

use crate::error::EnrichmentError;

/// Vendor label for locally administered (randomized or virtual) macs.
pub const RANDOMIZED_VENDOR: &str = "Private (randomized MAC)";

pub trait VendorLookup: Send {
    fn resolve(&self, mac: MacAddr) -> Option<String>;
}

pub trait HostnameLookup: Send {
    fn resolve(&self, ip: Ipv4Addr) -> Option<String>;
}

/// OUI lookup against a macvendors-style HTTP API: `GET <base><MAC>`
/// returning the vendor name as plain text.
pub struct MacVendorsClient {
    client: Client,
    base_url: String,
    /// Successful lookups only; failures are retried on the next new sighting.
    cache: Mutex<HashMap<MacAddr, String>>,
}

impl MacVendorsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, EnrichmentError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("lanwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(EnrichmentError::Client)?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn fetch(&self, mac: MacAddr) -> Result<String, EnrichmentError> {
        let url = format!("{}{}", self.base_url, mac.to_compact_upper());
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| EnrichmentError::Http { mac, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichmentError::Status {
                mac,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .map_err(|source| EnrichmentError::Http { mac, source })?;
        let vendor = body.trim();
        if vendor.is_empty() {
            return Err(EnrichmentError::EmptyBody { mac });
        }
        Ok(vendor.to_string())
    }
}

impl VendorLookup for MacVendorsClient {
    fn resolve(&self, mac: MacAddr) -> Option<String> {
        if mac.is_locally_administered() {
            return Some(RANDOMIZED_VENDOR.to_string());
        }
        if let Some(vendor) = self.cache.lock().get(&mac) {
            return Some(vendor.clone());
        }

        match self.fetch(mac) {
            Ok(vendor) => {
                self.cache.lock().insert(mac, vendor.clone());
                Some(vendor)
            }
            Err(e) => {
                debug!(%mac, error = %e, "Vendor lookup failed");
                None
            }
        }
    }
}

/// Reverse lookups still pending before new ones are refused.
pub const MAX_PENDING_LOOKUPS: usize = 4;

type Resolver = fn(&IpAddr) -> io::Result<String>;

/// Reverse DNS on a helper thread, abandoned after `timeout`.
///
/// The system resolver cannot be cancelled, so an abandoned thread runs on
/// until the resolver gives up. At most [`MAX_PENDING_LOOKUPS`] such threads
/// exist at once; further lookups fail with
/// [`EnrichmentError::Saturated`] until one of them returns.
pub struct ReverseDns {
    timeout: Duration,
    resolver: Resolver,
    pending: Arc<AtomicUsize>,
}

/// Releases a pending slot when the helper thread finishes.
struct PendingSlot(Arc<AtomicUsize>);

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ReverseDns {
    pub fn new(timeout: Duration) -> Self {
        Self::with_resolver(timeout, lookup_addr)
    }

    pub fn with_resolver(timeout: Duration, resolver: Resolver) -> Self {
        Self {
            timeout,
            resolver,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Helper threads that have not returned yet.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn reserve(&self, ip: Ipv4Addr) -> Result<PendingSlot, EnrichmentError> {
        self.pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < MAX_PENDING_LOOKUPS).then_some(n + 1)
            })
            .map_err(|_| EnrichmentError::Saturated {
                ip,
                limit: MAX_PENDING_LOOKUPS,
            })?;
        Ok(PendingSlot(Arc::clone(&self.pending)))
    }

    pub fn lookup(&self, ip: Ipv4Addr) -> Result<Option<String>, EnrichmentError> {
        let slot = self.reserve(ip)?;
        let resolver = self.resolver;
        let (tx, rx) = channel::bounded(1);
        thread::Builder::new()
            .name("rdns".into())
            .spawn(move || {
                let answer = resolver(&IpAddr::V4(ip));
                drop(slot);
                let _ = tx.send(answer);
            })
            .map_err(|source| EnrichmentError::Dns { ip, source })?;

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(name)) => Ok(hostname_or_none(ip, name)),
            Ok(Err(source)) => Err(EnrichmentError::Dns { ip, source }),
            Err(_) => Err(EnrichmentError::Timeout {
                ip,
                timeout: self.timeout,
            }),
        }
    }
}

/// Resolvers answer with the address itself when there is no PTR record.
fn hostname_or_none(ip: Ipv4Addr, name: String) -> Option<String> {
    let name = name.trim_end_matches('.').to_string();
    (!name.is_empty() && name != ip.to_string()).then_some(name)
}

impl HostnameLookup for ReverseDns {
    fn resolve(&self, ip: Ipv4Addr) -> Option<String> {
        self.lookup(ip).unwrap_or_else(|e| {
            debug!(%ip, error = %e, "Hostname lookup failed");
            None
        })
    }
}

/// Offline vendor lookup: only randomized macs get a label.
#[derive(Debug, Default)]
pub struct NoVendorLookup;

impl VendorLookup for NoVendorLookup {
    fn resolve(&self, mac: MacAddr) -> Option<String> {
        mac.is_locally_administered()
            .then(|| RANDOMIZED_VENDOR.to_string())
    }
}

#[derive(Debug, Default)]
pub struct NoHostnameLookup;

impl HostnameLookup for NoHostnameLookup {
    fn resolve(&self, _ip: Ipv4Addr) -> Option<String> {
        None
    }
}
