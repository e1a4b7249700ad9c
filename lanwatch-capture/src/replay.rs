//! Offline capture from a pcap file. Frame timestamps come from the file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use pcap::{Capture, Offline};
use tracing::{debug, info};

use crate::error::{CaptureError, StartupError};
use crate::packet::RawPacket;
use crate::source::{require_ethernet, CaptureEvent, CaptureStats, PacketSource};

pub struct ReplaySource {
    capture: Capture<Offline>,
    path: PathBuf,
}

impl ReplaySource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StartupError> {
        let path = path.as_ref().to_path_buf();
        let capture = Capture::from_file(&path).map_err(|source| StartupError::Open {
            target: path.display().to_string(),
            source,
        })?;
        require_ethernet(&capture, &path.display().to_string())?;
        info!(file = %path.display(), "Replay opened");
        Ok(Self { capture, path })
    }
}

impl PacketSource for ReplaySource {
    fn run(
        &mut self,
        terminate: &AtomicBool,
        on_event: &mut dyn FnMut(CaptureEvent),
    ) -> Result<CaptureStats, CaptureError> {
        let mut stats = CaptureStats {
            slices: 1,
            ..Default::default()
        };

        while !terminate.load(Ordering::Relaxed) {
            match self.capture.next_packet() {
                Ok(packet) => {
                    stats.packets += 1;
                    on_event(CaptureEvent::Packet(RawPacket::from_pcap(&packet)));
                }
                Err(pcap::Error::NoMorePackets) => break,
                Err(e) => return Err(e.into()),
            }
        }

        debug!(file = %self.path.display(), packets = stats.packets, "Replay finished");
        Ok(stats)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Little-endian classic pcap, microsecond timestamps, Ethernet link type.
    fn write_pcap(records: &[(u32, u32, &[u8])]) -> tempfile::NamedTempFile {
        write_pcap_with_linktype(1, records)
    }

    fn write_pcap_with_linktype(linktype: u32, records: &[(u32, u32, &[u8])]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut header = Vec::new();
        header.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
        header.extend_from_slice(&2u16.to_le_bytes());
        header.extend_from_slice(&4u16.to_le_bytes());
        header.extend_from_slice(&0i32.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes());
        header.extend_from_slice(&65535u32.to_le_bytes());
        header.extend_from_slice(&linktype.to_le_bytes());
        file.write_all(&header).unwrap();

        for (secs, micros, data) in records {
            let mut record = Vec::new();
            record.extend_from_slice(&secs.to_le_bytes());
            record.extend_from_slice(&micros.to_le_bytes());
            record.extend_from_slice(&(data.len() as u32).to_le_bytes());
            record.extend_from_slice(&(data.len() as u32).to_le_bytes());
            record.extend_from_slice(data);
            file.write_all(&record).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn replays_every_record_with_file_timestamps() {
        let frame = [0xffu8; 60];
        let file = write_pcap(&[(1_700_000_000, 250_000, &frame), (1_700_000_001, 0, &frame)]);

        let mut source = ReplaySource::open(file.path()).unwrap();
        let mut packets = Vec::new();
        let stats = source
            .run(&AtomicBool::new(false), &mut |event| {
                if let CaptureEvent::Packet(p) = event {
                    packets.push(p);
                }
            })
            .unwrap();

        assert_eq!(stats.packets, 2);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].timestamp.timestamp(), 1_700_000_000);
        assert_eq!(packets[0].timestamp.timestamp_subsec_millis(), 250);
        assert_eq!(packets[1].data.len(), 60);
    }

    #[test]
    fn rejects_non_ethernet_captures() {
        // 113 is Linux cooked capture, what `-i any` produces.
        let file = write_pcap_with_linktype(113, &[(1, 0, &[0u8; 60])]);
        match ReplaySource::open(file.path()) {
            Err(StartupError::UnsupportedLinkType { linktype, name, .. }) => {
                assert_eq!(linktype, 113);
                assert_eq!(name, "LINUX_SLL");
            }
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("cooked capture accepted"),
        }
    }

    #[test]
    fn stops_when_terminated() {
        let frame = [0u8; 60];
        let file = write_pcap(&[(1, 0, &frame), (2, 0, &frame)]);
        let mut source = ReplaySource::open(file.path()).unwrap();
        let stats = source.run(&AtomicBool::new(true), &mut |_| {}).unwrap();
        assert_eq!(stats.packets, 0);
    }

    #[test]
    fn missing_file_is_a_startup_error() {
        assert!(matches!(
            ReplaySource::open("/nonexistent/trace.pcap"),
            Err(StartupError::Open { .. })
        ));
    }
}
