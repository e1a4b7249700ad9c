//! ## lanwatch-protocols::frame
//! Layered decoding of one captured Ethernet frame.
//!
//! The Ethernet header must decode, everything above it is optional. An ARP
//! body that is present but unreadable fails the whole frame; a UDP datagram
//! on the DHCP ports whose payload is not DHCP simply leaves `dhcp` empty.

use std::net::Ipv4Addr;

use etherparse::{Ethernet2HeaderSlice, Ipv4HeaderSlice, UdpHeaderSlice};

use crate::arp::ArpView;
use crate::dhcp::{DhcpView, DHCP_CLIENT_PORT, DHCP_SERVER_PORT};
use crate::error::DecodeError;
use crate::mac::MacAddr;

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_VLAN: u16 = 0x8100;
pub const IP_PROTO_UDP: u8 = 17;

const VLAN_TAG_LEN: usize = 4;
const UDP_HEADER_LEN: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EthernetView {
    pub source: MacAddr,
    pub destination: MacAddr,
    /// EtherType of the payload, after a single 802.1Q tag if one was present.
    pub ether_type: u16,
    pub vlan_id: Option<u16>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv4View {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub ttl: u8,
    pub protocol: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UdpView {
    pub source_port: u16,
    pub destination_port: u16,
}

/// Decoded view of one captured unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub ethernet: EthernetView,
    pub arp: Option<ArpView>,
    pub ipv4: Option<Ipv4View>,
    pub udp: Option<UdpView>,
    pub dhcp: Option<DhcpView>,
    /// Captured length in bytes.
    pub len: usize,
}

impl Frame {
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let eth = Ethernet2HeaderSlice::from_slice(data).map_err(|_| DecodeError::Truncated {
            layer: "ethernet",
            needed: ETHERNET_HEADER_LEN,
            got: data.len(),
        })?;

        let mut ether_type = eth.ether_type().0;
        let mut offset = ETHERNET_HEADER_LEN;
        let mut vlan_id = None;
        if ether_type == ETHERTYPE_VLAN {
            let tag = data
                .get(offset..offset + VLAN_TAG_LEN)
                .ok_or(DecodeError::Truncated {
                    layer: "vlan",
                    needed: offset + VLAN_TAG_LEN,
                    got: data.len(),
                })?;
            vlan_id = Some(u16::from_be_bytes([tag[0], tag[1]]) & 0x0fff);
            ether_type = u16::from_be_bytes([tag[2], tag[3]]);
            offset += VLAN_TAG_LEN;
        }

        let mut frame = Frame {
            ethernet: EthernetView {
                source: MacAddr(eth.source()),
                destination: MacAddr(eth.destination()),
                ether_type,
                vlan_id,
            },
            arp: None,
            ipv4: None,
            udp: None,
            dhcp: None,
            len: data.len(),
        };

        let payload = &data[offset..];
        match ether_type {
            ETHERTYPE_ARP => frame.arp = Some(ArpView::parse(payload)?),
            ETHERTYPE_IPV4 => frame.decode_ipv4(payload)?,
            _ => {}
        }
        Ok(frame)
    }

    fn decode_ipv4(&mut self, payload: &[u8]) -> Result<(), DecodeError> {
        let ip = Ipv4HeaderSlice::from_slice(payload)
            .map_err(|e| DecodeError::malformed("ipv4", e))?;

        self.ipv4 = Some(Ipv4View {
            source: ip.source_addr(),
            destination: ip.destination_addr(),
            ttl: ip.ttl(),
            protocol: ip.protocol().0,
        });

        // Only the first fragment carries the transport header.
        let fragment_offset = u16::from_be_bytes([payload[6], payload[7]]) & 0x1fff;
        if fragment_offset != 0 || ip.protocol().0 != IP_PROTO_UDP {
            return Ok(());
        }

        let header_len = usize::from(ip.ihl()) * 4;
        let end = usize::from(ip.total_len()).clamp(header_len, payload.len());
        let transport = &payload[header_len..end];
        let Ok(udp) = UdpHeaderSlice::from_slice(transport) else {
            return Ok(());
        };
        let view = UdpView {
            source_port: udp.source_port(),
            destination_port: udp.destination_port(),
        };
        self.udp = Some(view);

        if is_dhcp_port(view.source_port) || is_dhcp_port(view.destination_port) {
            self.dhcp = DhcpView::parse(&transport[UDP_HEADER_LEN..]).ok();
        }
        Ok(())
    }

    /// Link-layer source address.
    pub fn source_mac(&self) -> MacAddr {
        self.ethernet.source
    }
}

fn is_dhcp_port(port: u16) -> bool {
    port == DHCP_SERVER_PORT || port == DHCP_CLIENT_PORT
}

/// Hand-assembled frames for tests and benches.
pub mod build {
    use super::*;

    pub fn ethernet(src: MacAddr, dst: MacAddr, ether_type: u16, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ETHERNET_HEADER_LEN + payload.len());
        bytes.extend_from_slice(&dst.octets());
        bytes.extend_from_slice(&src.octets());
        bytes.extend_from_slice(&ether_type.to_be_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    pub fn arp(operation: u16, hwsrc: MacAddr, psrc: Ipv4Addr, pdst: Ipv4Addr) -> Vec<u8> {
        let mut body = vec![0x00, 0x01, 0x08, 0x00, 6, 4];
        body.extend_from_slice(&operation.to_be_bytes());
        body.extend_from_slice(&hwsrc.octets());
        body.extend_from_slice(&psrc.octets());
        body.extend_from_slice(&[0u8; 6]);
        body.extend_from_slice(&pdst.octets());
        ethernet(hwsrc, MacAddr([0xff; 6]), ETHERTYPE_ARP, &body)
    }

    pub fn ipv4(src: Ipv4Addr, dst: Ipv4Addr, ttl: u8, protocol: u8, payload: &[u8]) -> Vec<u8> {
        let total_len = (20 + payload.len()) as u16;
        let mut header = vec![0x45, 0x00];
        header.extend_from_slice(&total_len.to_be_bytes());
        header.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, ttl, protocol, 0x00, 0x00]);
        header.extend_from_slice(&src.octets());
        header.extend_from_slice(&dst.octets());
        let checksum = ipv4_checksum(&header);
        header[10..12].copy_from_slice(&checksum.to_be_bytes());
        header.extend_from_slice(payload);
        header
    }

    pub fn udp(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let len = (UDP_HEADER_LEN + payload.len()) as u16;
        let mut bytes = Vec::with_capacity(len as usize);
        bytes.extend_from_slice(&src_port.to_be_bytes());
        bytes.extend_from_slice(&dst_port.to_be_bytes());
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(&[0, 0]);
        bytes.extend_from_slice(payload);
        bytes
    }

    /// Ethernet + IPv4 + UDP frame, the common case in tests.
    pub fn ipv4_udp(
        src_mac: MacAddr,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        ttl: u8,
        ports: (u16, u16),
        payload: &[u8],
    ) -> Vec<u8> {
        let datagram = udp(ports.0, ports.1, payload);
        let packet = ipv4(src, dst, ttl, IP_PROTO_UDP, &datagram);
        ethernet(src_mac, MacAddr([0xff; 6]), ETHERTYPE_IPV4, &packet)
    }

    fn ipv4_checksum(header: &[u8]) -> u16 {
        let mut sum: u32 = header
            .chunks(2)
            .map(|c| u32::from(u16::from_be_bytes([c[0], c[1]])))
            .sum();
        while sum > 0xffff {
            sum = (sum & 0xffff) + (sum >> 16);
        }
        !(sum as u16)
    }
}
