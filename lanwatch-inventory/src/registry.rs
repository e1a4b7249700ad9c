//! ## lanwatch-inventory::registry
//! **mac → profile inventory with sticky merge**
//!
//! Address extraction prefers ARP (`hwsrc`, `psrc`) over IPv4 (link-layer
//! source, IPv4 source). Frames that yield no usable address pair are
//! ignored. Each observation is written through to the store before
//! `observe` returns.
//!
//! Lookups are remembered: a mac with a resolved vendor is never looked up
//! again, a failed vendor lookup is retried only after
//! [`VENDOR_RETRY_SECS`], and every reverse lookup (including "no name") is
//! cached per ip. A gateway whose frames carry a new remote source address
//! each time therefore costs one hostname lookup per address, not per frame.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, trace};

use lanwatch_core::error::PersistenceError;
use lanwatch_core::models::{DeviceChange, DeviceProfile, DeviceUpdate, OsGuess, UNKNOWN_VENDOR};
use lanwatch_core::sink::EventStore;
use lanwatch_protocols::{Frame, MacAddr};

use crate::enrich::{HostnameLookup, NoHostnameLookup, NoVendorLookup, VendorLookup};

/// Frame-time delay before a failed vendor lookup is tried again.
pub const VENDOR_RETRY_SECS: i64 = 3600;

/// Reverse lookup results kept per ip.
pub const HOSTNAME_CACHE_CAPACITY: usize = 4096;

pub struct DeviceRegistry {
    devices: HashMap<MacAddr, DeviceProfile>,
    store: Arc<dyn EventStore>,
    vendors: Box<dyn VendorLookup>,
    hostnames: Box<dyn HostnameLookup>,
    /// Last failed vendor lookup per mac.
    vendor_misses: HashMap<MacAddr, DateTime<Utc>>,
    hostname_cache: HashMap<Ipv4Addr, Option<String>>,
}

/// The (mac, ip) pair a frame speaks for, if any.
pub fn extract_address(frame: &Frame) -> Option<(MacAddr, Ipv4Addr)> {
    let (mac, ip) = match (&frame.arp, &frame.ipv4) {
        (Some(arp), _) => (arp.hwsrc, arp.psrc),
        (None, Some(ipv4)) => (frame.source_mac(), ipv4.source),
        (None, None) => return None,
    };
    if ip.is_unspecified() || mac == MacAddr::default() {
        return None;
    }
    Some((mac, ip))
}

impl DeviceRegistry {
    pub fn new(
        store: Arc<dyn EventStore>,
        vendors: Box<dyn VendorLookup>,
        hostnames: Box<dyn HostnameLookup>,
    ) -> Self {
        Self {
            devices: HashMap::new(),
            store,
            vendors,
            hostnames,
            vendor_misses: HashMap::new(),
            hostname_cache: HashMap::new(),
        }
    }

    /// Registry without network enrichment.
    pub fn offline(store: Arc<dyn EventStore>) -> Self {
        Self::new(store, Box::new(NoVendorLookup), Box::new(NoHostnameLookup))
    }

    /// Seeds the in-memory map from the store so a restart keeps
    /// `first_seen` and the resolved enrichment.
    pub fn hydrate(&mut self) -> Result<usize, PersistenceError> {
        let stored = self.store.list_devices()?;
        let count = stored.len();
        for profile in stored {
            self.devices.insert(profile.mac, profile);
        }
        debug!(count, "Inventory loaded from storage");
        Ok(count)
    }

    pub fn observe(
        &mut self,
        frame: &Frame,
        now: DateTime<Utc>,
    ) -> Result<Option<DeviceUpdate>, PersistenceError> {
        let Some((mac, ip)) = extract_address(frame) else {
            return Ok(None);
        };

        let existing = self.devices.get(&mac);
        let change = match existing {
            None => DeviceChange::New,
            Some(known) if known.ip != ip => DeviceChange::IpChanged,
            Some(_) => DeviceChange::Refreshed,
        };

        let known_vendor = existing
            .and_then(|p| p.vendor.as_deref())
            .is_some_and(|v| v != UNKNOWN_VENDOR);
        let had_vendor = existing.and_then(|p| p.vendor.as_ref()).is_some();

        let mut observed = DeviceProfile::new(mac, ip, now);
        observed.os_guess = frame.ipv4.map(|ipv4| OsGuess::from_ttl(ipv4.ttl));
        if change != DeviceChange::Refreshed {
            if !known_vendor {
                observed.vendor = self
                    .lookup_vendor(mac, now)
                    .or_else(|| (!had_vendor).then(|| UNKNOWN_VENDOR.to_string()));
            }
            observed.hostname = self.lookup_hostname(ip);
        }

        let profile = match self.devices.get_mut(&mac) {
            Some(known) => {
                known.merge(observed);
                known.clone()
            }
            None => {
                debug!(%mac, %ip, vendor = ?observed.vendor, "New device");
                self.devices.insert(mac, observed.clone());
                observed
            }
        };
        trace!(%mac, %ip, ?change, "Device observed");

        self.store.upsert_device(&profile)?;
        Ok(Some(DeviceUpdate { change, profile }))
    }

    fn lookup_vendor(&mut self, mac: MacAddr, now: DateTime<Utc>) -> Option<String> {
        if let Some(failed) = self.vendor_misses.get(&mac) {
            if now - *failed < TimeDelta::seconds(VENDOR_RETRY_SECS) {
                return None;
            }
        }
        let vendor = self.vendors.resolve(mac);
        match vendor {
            Some(_) => {
                self.vendor_misses.remove(&mac);
            }
            None => {
                self.vendor_misses.insert(mac, now);
            }
        }
        vendor
    }

    fn lookup_hostname(&mut self, ip: Ipv4Addr) -> Option<String> {
        if let Some(cached) = self.hostname_cache.get(&ip) {
            return cached.clone();
        }
        let hostname = self.hostnames.resolve(ip);
        if self.hostname_cache.len() >= HOSTNAME_CACHE_CAPACITY {
            // No recency order is kept; any entry will do.
            if let Some(evict) = self.hostname_cache.keys().next().copied() {
                self.hostname_cache.remove(&evict);
            }
        }
        self.hostname_cache.insert(ip, hostname.clone());
        hostname
    }

    pub fn get(&self, mac: &MacAddr) -> Option<&DeviceProfile> {
        self.devices.get(mac)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
