//! STUN binding probe (RFC 5389, binding request only)
//!
//! Used at startup by operators without a static public address: each
//! configured server is tried in order and the first mapped address wins.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, warn};

const MAGIC_COOKIE: u32 = 0x2112_A442;
const BINDING_REQUEST: u16 = 0x0001;
const BINDING_SUCCESS: u16 = 0x0101;
const ATTR_MAPPED_ADDRESS: u16 = 0x0001;
const ATTR_XOR_MAPPED_ADDRESS: u16 = 0x0020;
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Probe the configured STUN servers in fallback order.
///
/// Returns the first public address any server reports, or `None` when
/// every probe fails.
pub async fn probe_public_address(servers: &[String]) -> Option<IpAddr> {
    for server in servers {
        match probe_one(server).await {
            Ok(addr) => {
                debug!(server = %server, address = %addr, "STUN probe succeeded");
                return Some(addr);
            }
            Err(reason) => {
                warn!(server = %server, reason = %reason, "STUN probe failed, trying next");
            }
        }
    }
    None
}

async fn probe_one(server: &str) -> Result<IpAddr, String> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|e| e.to_string())?;
    let target = with_default_port(server);
    socket.connect(&target).await.map_err(|e| e.to_string())?;

    let txid: [u8; 12] = rand::random();
    let request = binding_request(&txid);
    socket.send(&request).await.map_err(|e| e.to_string())?;

    let mut buf = [0u8; 512];
    let n = timeout(PROBE_TIMEOUT, socket.recv(&mut buf))
        .await
        .map_err(|_| "timeout".to_string())?
        .map_err(|e| e.to_string())?;

    parse_binding_response(&buf[..n], &txid).ok_or_else(|| "no mapped address".to_string())
}

fn binding_request(txid: &[u8; 12]) -> [u8; 20] {
    let mut msg = [0u8; 20];
    msg[0..2].copy_from_slice(&BINDING_REQUEST.to_be_bytes());
    // length 0: no attributes
    msg[4..8].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
    msg[8..20].copy_from_slice(txid);
    msg
}

fn parse_binding_response(buf: &[u8], txid: &[u8; 12]) -> Option<IpAddr> {
    if buf.len() < 20 {
        return None;
    }
    let msg_type = u16::from_be_bytes([buf[0], buf[1]]);
    if msg_type != BINDING_SUCCESS || &buf[8..20] != txid {
        return None;
    }
    let msg_len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
    let attrs = buf.get(20..20 + msg_len)?;

    let mut offset = 0;
    while offset + 4 <= attrs.len() {
        let attr_type = u16::from_be_bytes([attrs[offset], attrs[offset + 1]]);
        let attr_len = u16::from_be_bytes([attrs[offset + 2], attrs[offset + 3]]) as usize;
        let value = attrs.get(offset + 4..offset + 4 + attr_len)?;

        match attr_type {
            ATTR_XOR_MAPPED_ADDRESS => {
                if let Some(addr) = parse_address(value, true) {
                    return Some(addr);
                }
            }
            ATTR_MAPPED_ADDRESS => {
                if let Some(addr) = parse_address(value, false) {
                    return Some(addr);
                }
            }
            _ => {}
        }
        // Attributes are padded to 4-byte boundaries.
        offset += 4 + attr_len.div_ceil(4) * 4;
    }
    None
}

fn parse_address(value: &[u8], xored: bool) -> Option<IpAddr> {
    // family(1, offset 1) + port(2) + address
    if value.len() < 8 || value[1] != 0x01 {
        return None; // IPv4 only
    }
    let mut octets = [value[4], value[5], value[6], value[7]];
    if xored {
        let cookie = MAGIC_COOKIE.to_be_bytes();
        for i in 0..4 {
            octets[i] ^= cookie[i];
        }
    }
    Some(IpAddr::V4(Ipv4Addr::from(octets)))
}

// Appends the well-known STUN port when the entry has none.
fn with_default_port(entry: &str) -> String {
    if entry.contains(':') {
        entry.to_string()
    } else {
        format!("{entry}:3478")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_layout() {
        let txid = [7u8; 12];
        let req = binding_request(&txid);
        assert_eq!(u16::from_be_bytes([req[0], req[1]]), BINDING_REQUEST);
        assert_eq!(u16::from_be_bytes([req[2], req[3]]), 0);
        assert_eq!(&req[8..], &txid);
    }

    #[test]
    fn parses_xor_mapped_address() {
        let txid = [3u8; 12];
        // XOR-MAPPED-ADDRESS for 192.0.2.1:3478
        let ip: u32 = u32::from(Ipv4Addr::new(192, 0, 2, 1)) ^ MAGIC_COOKIE;
        let port: u16 = 3478 ^ (MAGIC_COOKIE >> 16) as u16;
        let mut resp = Vec::new();
        resp.extend_from_slice(&BINDING_SUCCESS.to_be_bytes());
        resp.extend_from_slice(&12u16.to_be_bytes());
        resp.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
        resp.extend_from_slice(&txid);
        resp.extend_from_slice(&ATTR_XOR_MAPPED_ADDRESS.to_be_bytes());
        resp.extend_from_slice(&8u16.to_be_bytes());
        resp.extend_from_slice(&[0x00, 0x01]);
        resp.extend_from_slice(&port.to_be_bytes());
        resp.extend_from_slice(&ip.to_be_bytes());

        let parsed = parse_binding_response(&resp, &txid).unwrap();
        assert_eq!(parsed, IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
    }

    #[test]
    fn mismatched_txid_is_rejected() {
        let txid = [3u8; 12];
        let mut resp = vec![0u8; 20];
        resp[0..2].copy_from_slice(&BINDING_SUCCESS.to_be_bytes());
        resp[8..20].copy_from_slice(&[9u8; 12]);
        assert!(parse_binding_response(&resp, &txid).is_none());
    }

    #[test]
    fn server_entry_defaults_port() {
        assert_eq!(with_default_port("stun.example.net"), "stun.example.net:3478");
        assert_eq!(
            with_default_port("stun.example.net:19302"),
            "stun.example.net:19302"
        );
    }
}
