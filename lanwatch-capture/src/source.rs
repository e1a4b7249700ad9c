use std::sync::atomic::AtomicBool;

use pcap::{Activated, Capture, Linktype};

use crate::error::{CaptureError, StartupError};
use crate::packet::RawPacket;

/// What a source reports to its consumer.
#[derive(Debug)]
pub enum CaptureEvent {
    Packet(RawPacket),
    /// A slice ended early with an error; capture resumes with the next slice.
    SliceFailed(CaptureError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub packets: u64,
    pub slices: u64,
    pub failed_slices: u64,
}

/// A blocking producer of raw frames.
///
/// `run` returns once `terminate` is observed or the source is exhausted.
pub trait PacketSource: Send {
    fn run(
        &mut self,
        terminate: &AtomicBool,
        on_event: &mut dyn FnMut(CaptureEvent),
    ) -> Result<CaptureStats, CaptureError>;

    /// Interface or file name, for logs.
    fn describe(&self) -> String;
}

/// Rejects captures whose frames are not Ethernet II.
pub(crate) fn require_ethernet<T: Activated + ?Sized>(
    capture: &Capture<T>,
    target: &str,
) -> Result<(), StartupError> {
    let linktype = capture.get_datalink();
    if linktype == Linktype::ETHERNET {
        return Ok(());
    }
    Err(StartupError::UnsupportedLinkType {
        target: target.to_string(),
        linktype: linktype.0,
        name: linktype.get_name().unwrap_or_else(|_| "unknown".to_string()),
    })
}
