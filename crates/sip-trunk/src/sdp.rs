//! SDP offer parsing and answer building
//!
//! The trunk answers audio-only offers. Codec preference is Opus at 48 kHz,
//! then PCMA, then PCMU; anything else fails negotiation and the INVITE is
//! rejected with 488. The configured public address is written into the
//! `o=` and `c=` lines of every answer.

use std::net::IpAddr;

use crate::error::{Result, TrunkError};

/// Codecs the trunk can negotiate, in preference order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    /// Opus, 48 kHz (dynamic payload type from the offer)
    Opus,
    /// G.711 A-law, 8 kHz, payload type 8
    Pcma,
    /// G.711 u-law, 8 kHz, payload type 0
    Pcmu,
}

impl CodecKind {
    /// RTP clock rate of the codec
    pub fn clock_rate(&self) -> u32 {
        match self {
            CodecKind::Opus => 48_000,
            CodecKind::Pcma | CodecKind::Pcmu => 8_000,
        }
    }

    /// rtpmap encoding name
    pub fn encoding_name(&self) -> &'static str {
        match self {
            CodecKind::Opus => "opus",
            CodecKind::Pcma => "PCMA",
            CodecKind::Pcmu => "PCMU",
        }
    }
}

/// One codec offered in an `m=audio` section
#[derive(Debug, Clone)]
pub struct OfferedCodec {
    /// RTP payload type
    pub payload_type: u8,
    /// Encoding name from rtpmap (upper/lower case as received)
    pub name: String,
    /// Clock rate from rtpmap
    pub clock_rate: u32,
}

/// The subset of an SDP offer the trunk acts on
#[derive(Debug, Clone)]
pub struct SdpOffer {
    /// Peer media address from the `c=` line
    pub connection: IpAddr,
    /// Peer RTP port from the `m=audio` line
    pub media_port: u16,
    /// Codecs in the peer's preference order
    pub codecs: Vec<OfferedCodec>,
}

/// Result of codec negotiation
#[derive(Debug, Clone, Copy)]
pub struct NegotiatedCodec {
    /// Which codec was chosen
    pub kind: CodecKind,
    /// Payload type to put on the wire (the offerer's for dynamic codecs)
    pub payload_type: u8,
}

/// Parse an SDP body into the fields the trunk needs
pub fn parse_offer(body: &str) -> Result<SdpOffer> {
    let mut connection = None;
    let mut media_port = None;
    let mut payload_types: Vec<u8> = Vec::new();
    let mut rtpmaps: Vec<(u8, String, u32)> = Vec::new();
    let mut in_audio = false;
    let mut audio_seen = false;

    for line in body.lines() {
        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix("c=") {
            // c=IN IP4 203.0.113.9 — session level or inside the audio section
            if connection.is_none() || in_audio {
                connection = parse_connection(rest);
            }
        } else if let Some(rest) = line.strip_prefix("m=") {
            in_audio = rest.starts_with("audio ");
            if in_audio && !audio_seen {
                audio_seen = true;
                let mut parts = rest.split_whitespace();
                parts.next(); // "audio"
                media_port = parts.next().and_then(|p| p.parse().ok());
                parts.next(); // proto
                for pt in parts {
                    if let Ok(pt) = pt.parse() {
                        payload_types.push(pt);
                    }
                }
            }
        } else if in_audio {
            if let Some(rest) = line.strip_prefix("a=rtpmap:") {
                // a=rtpmap:111 opus/48000/2
                let mut parts = rest.splitn(2, ' ');
                let pt: Option<u8> = parts.next().and_then(|p| p.parse().ok());
                if let (Some(pt), Some(enc)) = (pt, parts.next()) {
                    let mut enc_parts = enc.split('/');
                    let name = enc_parts.next().unwrap_or("").to_string();
                    let clock = enc_parts.next().and_then(|c| c.parse().ok()).unwrap_or(0);
                    rtpmaps.push((pt, name, clock));
                }
            }
        }
    }

    let media_port = media_port.ok_or_else(|| TrunkError::Protocol {
        reason: "offer has no audio section".into(),
    })?;
    let connection = connection.ok_or_else(|| TrunkError::Protocol {
        reason: "offer has no connection address".into(),
    })?;

    let codecs = payload_types
        .into_iter()
        .map(|pt| {
            if let Some((_, name, clock)) = rtpmaps.iter().find(|(p, _, _)| *p == pt) {
                OfferedCodec {
                    payload_type: pt,
                    name: name.clone(),
                    clock_rate: *clock,
                }
            } else {
                // Static payload types may come without an rtpmap.
                let (name, clock) = match pt {
                    0 => ("PCMU", 8_000),
                    8 => ("PCMA", 8_000),
                    _ => ("", 0),
                };
                OfferedCodec {
                    payload_type: pt,
                    name: name.to_string(),
                    clock_rate: clock,
                }
            }
        })
        .collect();

    Ok(SdpOffer {
        connection,
        media_port,
        codecs,
    })
}

fn parse_connection(rest: &str) -> Option<IpAddr> {
    // IN IP4 <addr>
    rest.split_whitespace().nth(2)?.parse().ok()
}

/// Pick the best codec we support from an offer.
///
/// Preference: Opus 48 kHz, PCMA, PCMU. Returns `None` when nothing
/// matches (caller responds 488).
pub fn select_codec(offer: &SdpOffer) -> Option<NegotiatedCodec> {
    for (kind, name, clock) in [
        (CodecKind::Opus, "opus", 48_000u32),
        (CodecKind::Pcma, "PCMA", 8_000),
        (CodecKind::Pcmu, "PCMU", 8_000),
    ] {
        if let Some(offered) = offer
            .codecs
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name) && c.clock_rate == clock)
        {
            return Some(NegotiatedCodec {
                kind,
                payload_type: offered.payload_type,
            });
        }
    }
    None
}

/// Build the SDP answer for an accepted call
pub fn build_answer(
    public_ip: IpAddr,
    rtp_port: u16,
    codec: NegotiatedCodec,
    session_id: u64,
) -> String {
    let mut sdp = String::new();
    sdp.push_str("v=0\r\n");
    sdp.push_str(&format!(
        "o=voxgate {session_id} {session_id} IN IP4 {public_ip}\r\n"
    ));
    sdp.push_str("s=voxgate\r\n");
    sdp.push_str(&format!("c=IN IP4 {public_ip}\r\n"));
    sdp.push_str("t=0 0\r\n");
    sdp.push_str(&format!(
        "m=audio {rtp_port} RTP/AVP {}\r\n",
        codec.payload_type
    ));
    match codec.kind {
        CodecKind::Opus => {
            sdp.push_str(&format!(
                "a=rtpmap:{} opus/48000/2\r\n",
                codec.payload_type
            ));
            sdp.push_str(&format!("a=fmtp:{} useinbandfec=1\r\n", codec.payload_type));
        }
        CodecKind::Pcma => {
            sdp.push_str(&format!("a=rtpmap:{} PCMA/8000\r\n", codec.payload_type));
        }
        CodecKind::Pcmu => {
            sdp.push_str(&format!("a=rtpmap:{} PCMU/8000\r\n", codec.payload_type));
        }
    }
    sdp.push_str("a=ptime:20\r\n");
    sdp.push_str("a=sendrecv\r\n");
    sdp
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFER: &str = "v=0\r\n\
        o=carrier 123 456 IN IP4 203.0.113.9\r\n\
        s=-\r\n\
        c=IN IP4 203.0.113.9\r\n\
        t=0 0\r\n\
        m=audio 10000 RTP/AVP 111 8 0\r\n\
        a=rtpmap:111 opus/48000/2\r\n\
        a=rtpmap:8 PCMA/8000\r\n\
        a=rtpmap:0 PCMU/8000\r\n";

    #[test]
    fn parses_offer() {
        let offer = parse_offer(OFFER).unwrap();
        assert_eq!(offer.media_port, 10000);
        assert_eq!(offer.connection, "203.0.113.9".parse::<IpAddr>().unwrap());
        assert_eq!(offer.codecs.len(), 3);
    }

    #[test]
    fn prefers_opus_over_g711() {
        let offer = parse_offer(OFFER).unwrap();
        let codec = select_codec(&offer).unwrap();
        assert_eq!(codec.kind, CodecKind::Opus);
        assert_eq!(codec.payload_type, 111);
    }

    #[test]
    fn falls_back_to_pcma_then_pcmu() {
        let offer = parse_offer(
            "v=0\r\nc=IN IP4 1.2.3.4\r\nm=audio 4000 RTP/AVP 0 8\r\n",
        )
        .unwrap();
        let codec = select_codec(&offer).unwrap();
        // PCMA wins over PCMU despite offer order.
        assert_eq!(codec.kind, CodecKind::Pcma);
        assert_eq!(codec.payload_type, 8);
    }

    #[test]
    fn unsupported_offer_yields_none() {
        let offer = parse_offer(
            "v=0\r\nc=IN IP4 1.2.3.4\r\nm=audio 4000 RTP/AVP 96\r\na=rtpmap:96 G722/8000\r\n",
        )
        .unwrap();
        assert!(select_codec(&offer).is_none());
    }

    #[test]
    fn answer_carries_public_address() {
        let answer = build_answer(
            "198.51.100.7".parse().unwrap(),
            4002,
            NegotiatedCodec {
                kind: CodecKind::Opus,
                payload_type: 111,
            },
            42,
        );
        assert!(answer.contains("c=IN IP4 198.51.100.7\r\n"));
        assert!(answer.contains("o=voxgate 42 42 IN IP4 198.51.100.7\r\n"));
        assert!(answer.contains("m=audio 4002 RTP/AVP 111\r\n"));
        assert!(answer.contains("a=ptime:20\r\n"));
    }
}
