//! ## lanwatch-protocols::dhcp
//! BOOTP/DHCP message decoding (RFC 2131 / RFC 2132).
//!
//! Only the fixed header fields and the raw option list are kept. Options are
//! stored as `(code, bytes)` pairs; typed accessors cover the ones the rule
//! engine and the inventory read.

use std::fmt;
use std::net::Ipv4Addr;

use crate::error::DecodeError;
use crate::mac::MacAddr;

pub const DHCP_SERVER_PORT: u16 = 67;
pub const DHCP_CLIENT_PORT: u16 = 68;
pub const DHCP_MAGIC_COOKIE: u32 = 0x6382_5363;

const BOOTP_FIXED_LEN: usize = 236;
const OPTIONS_OFFSET: usize = 240;

pub const OPTION_PAD: u8 = 0;
pub const OPTION_HOSTNAME: u8 = 12;
pub const OPTION_MESSAGE_TYPE: u8 = 53;
pub const OPTION_SERVER_ID: u8 = 54;
pub const OPTION_END: u8 = 255;

/// DHCP message types (option 53).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpMessageType {
    Discover = 1,
    Offer = 2,
    Request = 3,
    Decline = 4,
    Ack = 5,
    Nak = 6,
    Release = 7,
    Inform = 8,
}

impl DhcpMessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Discover),
            2 => Some(Self::Offer),
            3 => Some(Self::Request),
            4 => Some(Self::Decline),
            5 => Some(Self::Ack),
            6 => Some(Self::Nak),
            7 => Some(Self::Release),
            8 => Some(Self::Inform),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discover => "DISCOVER",
            Self::Offer => "OFFER",
            Self::Request => "REQUEST",
            Self::Decline => "DECLINE",
            Self::Ack => "ACK",
            Self::Nak => "NAK",
            Self::Release => "RELEASE",
            Self::Inform => "INFORM",
        }
    }
}

impl fmt::Display for DhcpMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DhcpOption {
    pub code: u8,
    pub data: Vec<u8>,
}

/// Decoded DHCP message carried in a UDP datagram on port 67/68.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DhcpView {
    /// 1 = BOOTREQUEST, 2 = BOOTREPLY.
    pub op: u8,
    pub xid: u32,
    pub yiaddr: Ipv4Addr,
    pub client_mac: MacAddr,
    pub options: Vec<DhcpOption>,
}

impl DhcpView {
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < OPTIONS_OFFSET {
            return Err(DecodeError::Truncated {
                layer: "dhcp",
                needed: OPTIONS_OFFSET,
                got: data.len(),
            });
        }

        let cookie = u32::from_be_bytes([data[236], data[237], data[238], data[239]]);
        if cookie != DHCP_MAGIC_COOKIE {
            return Err(DecodeError::malformed(
                "dhcp",
                format!("bad magic cookie {cookie:#010x}"),
            ));
        }

        let mut client_mac = [0u8; 6];
        client_mac.copy_from_slice(&data[28..34]);

        Ok(Self {
            op: data[0],
            xid: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            yiaddr: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
            client_mac: MacAddr(client_mac),
            options: parse_options(&data[OPTIONS_OFFSET..])?,
        })
    }

    pub fn option(&self, code: u8) -> Option<&[u8]> {
        self.options
            .iter()
            .find(|o| o.code == code)
            .map(|o| o.data.as_slice())
    }

    /// Raw value of option 53, if present.
    pub fn message_type_code(&self) -> Option<u8> {
        self.option(OPTION_MESSAGE_TYPE)
            .and_then(|d| d.first().copied())
    }

    pub fn message_type(&self) -> Option<DhcpMessageType> {
        self.message_type_code().and_then(DhcpMessageType::from_u8)
    }

    pub fn is_offer(&self) -> bool {
        self.message_type() == Some(DhcpMessageType::Offer)
    }

    pub fn server_id(&self) -> Option<Ipv4Addr> {
        match self.option(OPTION_SERVER_ID)? {
            [a, b, c, d] => Some(Ipv4Addr::new(*a, *b, *c, *d)),
            _ => None,
        }
    }

    pub fn hostname(&self) -> Option<String> {
        self.option(OPTION_HOSTNAME)
            .map(|d| String::from_utf8_lossy(d).trim_end_matches('\0').to_string())
            .filter(|h| !h.is_empty())
    }
}

fn parse_options(mut data: &[u8]) -> Result<Vec<DhcpOption>, DecodeError> {
    let mut options = Vec::new();
    while let Some((&code, rest)) = data.split_first() {
        match code {
            OPTION_PAD => {
                data = rest;
            }
            OPTION_END => break,
            _ => {
                let Some((&len, rest)) = rest.split_first() else {
                    return Err(DecodeError::malformed(
                        "dhcp",
                        format!("option {code} has no length"),
                    ));
                };
                let len = len as usize;
                if rest.len() < len {
                    return Err(DecodeError::malformed(
                        "dhcp",
                        format!("option {code} length {len} exceeds packet"),
                    ));
                }
                options.push(DhcpOption {
                    code,
                    data: rest[..len].to_vec(),
                });
                data = &rest[len..];
            }
        }
    }
    Ok(options)
}

/// Builds a minimal BOOTP message with the given options; used by tests and
/// benches across the workspace.
pub fn build_message(op: u8, client_mac: MacAddr, options: &[(u8, &[u8])]) -> Vec<u8> {
    let mut bytes = vec![0u8; BOOTP_FIXED_LEN];
    bytes[0] = op;
    bytes[1] = 1;
    bytes[2] = 6;
    bytes[28..34].copy_from_slice(&client_mac.octets());
    bytes.extend_from_slice(&DHCP_MAGIC_COOKIE.to_be_bytes());
    for (code, data) in options {
        bytes.push(*code);
        bytes.push(data.len() as u8);
        bytes.extend_from_slice(data);
    }
    bytes.push(OPTION_END);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> MacAddr {
        MacAddr([0x02, 0, 0, 0, 0, 0x42])
    }

    #[test]
    fn parses_offer_options() {
        let msg = build_message(
            2,
            client(),
            &[
                (OPTION_MESSAGE_TYPE, &[2]),
                (OPTION_SERVER_ID, &[192, 168, 1, 1]),
                (OPTION_HOSTNAME, b"printer"),
            ],
        );
        let dhcp = DhcpView::parse(&msg).unwrap();
        assert_eq!(dhcp.op, 2);
        assert!(dhcp.is_offer());
        assert_eq!(dhcp.message_type(), Some(DhcpMessageType::Offer));
        assert_eq!(dhcp.server_id(), Some(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(dhcp.hostname().as_deref(), Some("printer"));
        assert_eq!(dhcp.client_mac, client());
    }

    #[test]
    fn pads_are_skipped_and_unknown_types_kept_raw() {
        let mut msg = build_message(1, client(), &[]);
        msg.pop();
        msg.extend_from_slice(&[OPTION_PAD, OPTION_PAD, OPTION_MESSAGE_TYPE, 1, 42, OPTION_END]);
        let dhcp = DhcpView::parse(&msg).unwrap();
        assert_eq!(dhcp.message_type_code(), Some(42));
        assert_eq!(dhcp.message_type(), None);
        assert!(!dhcp.is_offer());
    }

    #[test]
    fn rejects_bad_cookie_and_overlong_option() {
        let mut msg = build_message(2, client(), &[(OPTION_MESSAGE_TYPE, &[2])]);
        msg[236] = 0;
        assert!(DhcpView::parse(&msg).is_err());

        let mut msg = build_message(2, client(), &[]);
        msg.pop();
        msg.extend_from_slice(&[OPTION_MESSAGE_TYPE, 9, 2]);
        assert!(matches!(
            DhcpView::parse(&msg),
            Err(DecodeError::Malformed { layer: "dhcp", .. })
        ));

        assert!(matches!(
            DhcpView::parse(&[0u8; 100]),
            Err(DecodeError::Truncated { layer: "dhcp", .. })
        ));
    }
}
