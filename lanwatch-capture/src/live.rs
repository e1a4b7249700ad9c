//! Live capture on a network interface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use pcap::{Active, Capture, Device};
use tracing::{debug, info, trace, warn};

use lanwatch_config::CaptureConfig;

use crate::error::{CaptureError, StartupError};
use crate::packet::RawPacket;
use crate::source::{require_ethernet, CaptureEvent, CaptureStats, PacketSource};

const FAILED_SLICE_POLL: Duration = Duration::from_millis(100);

/// Names of all interfaces the capture backend can open.
pub fn available_interfaces() -> Result<Vec<String>, StartupError> {
    Ok(Device::list()
        .map_err(StartupError::DeviceList)?
        .into_iter()
        .map(|d| d.name)
        .collect())
}

/// Resolves an interface name to a capture device, failing with the list of
/// available interfaces if it does not exist on this host.
pub fn validate_interface(name: &str) -> Result<Device, StartupError> {
    let devices = Device::list().map_err(StartupError::DeviceList)?;
    let available: Vec<String> = devices.iter().map(|d| d.name.clone()).collect();
    devices
        .into_iter()
        .find(|d| d.name == name)
        .ok_or_else(|| StartupError::InterfaceNotFound {
            name: name.to_string(),
            available,
        })
}

pub struct LiveSource {
    capture: Capture<Active>,
    interface: String,
    slice: Duration,
}

impl LiveSource {
    /// Validates the configured interface (or picks the default device) and
    /// opens it.
    pub fn open(config: &CaptureConfig) -> Result<Self, StartupError> {
        let device = match config.interface.as_deref() {
            Some(name) => validate_interface(name)?,
            None => Device::lookup()
                .map_err(StartupError::DeviceList)?
                .ok_or(StartupError::NoDefaultDevice)?,
        };
        let interface = device.name.clone();
        let slice = Duration::from_secs(config.slice_secs);
        let read_timeout = read_timeout_ms(config.read_timeout_ms, slice);

        let open_err = |source| StartupError::Open {
            target: interface.clone(),
            source,
        };
        let mut capture = Capture::from_device(device)
            .map_err(open_err)?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen)
            .timeout(read_timeout)
            .open()
            .map_err(open_err)?;
        require_ethernet(&capture, &interface)?;

        if let Some(filter) = config.filter.as_deref() {
            capture
                .filter(filter, true)
                .map_err(|source| StartupError::Filter {
                    filter: filter.to_string(),
                    source,
                })?;
        }

        info!(
            interface = %interface,
            promiscuous = config.promiscuous,
            snaplen = config.snaplen,
            slice_secs = config.slice_secs,
            "Capture opened"
        );
        Ok(Self {
            capture,
            interface,
            slice,
        })
    }

    /// Reads until the slice deadline. The stop flag is not consulted here.
    fn run_slice(
        &mut self,
        deadline: Instant,
        on_event: &mut dyn FnMut(CaptureEvent),
        stats: &mut CaptureStats,
    ) -> Result<(), CaptureError> {
        while Instant::now() < deadline {
            match self.capture.next_packet() {
                Ok(packet) => {
                    stats.packets += 1;
                    on_event(CaptureEvent::Packet(RawPacket::from_pcap(&packet)));
                }
                Err(pcap::Error::TimeoutExpired) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// The pcap read timeout must expire well inside a slice, or a quiet link
/// would hold the loop past its deadline.
fn read_timeout_ms(configured: i32, slice: Duration) -> i32 {
    let half_slice = i32::try_from(slice.as_millis() / 2).unwrap_or(i32::MAX);
    configured.clamp(1, half_slice.max(1))
}

impl PacketSource for LiveSource {
    fn run(
        &mut self,
        terminate: &AtomicBool,
        on_event: &mut dyn FnMut(CaptureEvent),
    ) -> Result<CaptureStats, CaptureError> {
        let mut stats = CaptureStats::default();

        while !terminate.load(Ordering::Relaxed) {
            let deadline = Instant::now() + self.slice;
            stats.slices += 1;
            trace!(slice = stats.slices, "Capture slice started");

            if let Err(e) = self.run_slice(deadline, on_event, &mut stats) {
                stats.failed_slices += 1;
                warn!(interface = %self.interface, error = %e, "Capture slice failed");
                on_event(CaptureEvent::SliceFailed(e));
                // Sit out the rest of the failed slice.
                while Instant::now() < deadline && !terminate.load(Ordering::Relaxed) {
                    thread::sleep(FAILED_SLICE_POLL);
                }
            }
        }

        debug!(
            interface = %self.interface,
            packets = stats.packets,
            slices = stats.slices,
            failed = stats.failed_slices,
            "Capture stopped"
        );
        Ok(stats)
    }

    fn describe(&self) -> String {
        self.interface.clone()
    }
}
