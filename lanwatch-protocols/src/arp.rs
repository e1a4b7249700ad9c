//! ## lanwatch-protocols::arp
//! Fixed-offset ARP decoder for Ethernet/IPv4 address resolution.

use std::net::Ipv4Addr;

use crate::error::DecodeError;
use crate::mac::MacAddr;

pub const ARP_PACKET_LEN: usize = 28;
pub const ARP_OP_REQUEST: u16 = 1;
pub const ARP_OP_REPLY: u16 = 2;

const HTYPE_ETHERNET: u16 = 1;
const PTYPE_IPV4: u16 = 0x0800;

/// Sender and target addresses of one ARP message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArpView {
    pub operation: u16,
    /// Sender hardware address (`hwsrc`).
    pub hwsrc: MacAddr,
    /// Sender protocol address (`psrc`).
    pub psrc: Ipv4Addr,
    pub hwdst: MacAddr,
    pub pdst: Ipv4Addr,
}

impl ArpView {
    pub fn parse(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < ARP_PACKET_LEN {
            return Err(DecodeError::Truncated {
                layer: "arp",
                needed: ARP_PACKET_LEN,
                got: payload.len(),
            });
        }

        let htype = u16::from_be_bytes([payload[0], payload[1]]);
        let ptype = u16::from_be_bytes([payload[2], payload[3]]);
        let (hlen, plen) = (payload[4], payload[5]);
        if htype != HTYPE_ETHERNET || ptype != PTYPE_IPV4 || hlen != 6 || plen != 4 {
            return Err(DecodeError::malformed(
                "arp",
                format!("unsupported htype={htype} ptype={ptype:#06x} hlen={hlen} plen={plen}"),
            ));
        }

        Ok(Self {
            operation: u16::from_be_bytes([payload[6], payload[7]]),
            hwsrc: mac_at(payload, 8),
            psrc: ipv4_at(payload, 14),
            hwdst: mac_at(payload, 18),
            pdst: ipv4_at(payload, 24),
        })
    }

    pub fn is_reply(&self) -> bool {
        self.operation == ARP_OP_REPLY
    }

    /// Announcements and replies sent with psrc == pdst.
    pub fn is_gratuitous(&self) -> bool {
        self.psrc == self.pdst
    }
}

fn mac_at(data: &[u8], offset: usize) -> MacAddr {
    let mut octets = [0u8; 6];
    octets.copy_from_slice(&data[offset..offset + 6]);
    MacAddr(octets)
}

fn ipv4_at(data: &[u8], offset: usize) -> Ipv4Addr {
    Ipv4Addr::new(
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    )
}
