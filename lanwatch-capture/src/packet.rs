use bytes::Bytes;
use chrono::{DateTime, Utc};

/// One captured frame, undecoded, with the capture header timestamp.
#[derive(Debug, Clone)]
pub struct RawPacket {
    pub timestamp: DateTime<Utc>,
    pub data: Bytes,
}

impl RawPacket {
    pub fn new(timestamp: DateTime<Utc>, data: impl Into<Bytes>) -> Self {
        Self {
            timestamp,
            data: data.into(),
        }
    }

    /// Builds a packet from a pcap record, falling back to the wall clock if
    /// the header carries an unrepresentable timestamp.
    pub(crate) fn from_pcap(packet: &pcap::Packet<'_>) -> Self {
        let ts = packet.header.ts;
        let micros = (ts.tv_usec as i64).clamp(0, 999_999);
        let timestamp = DateTime::from_timestamp(ts.tv_sec as i64, (micros * 1_000) as u32)
            .unwrap_or_else(Utc::now);
        Self::new(timestamp, Bytes::copy_from_slice(packet.data))
    }
}
