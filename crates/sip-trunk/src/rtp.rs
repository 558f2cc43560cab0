//! RTP session and media pacing
//!
//! One media task per call owns the RTP socket. A 20 ms interval paces the
//! TX direction: each tick takes the next frame from the TX queue or
//! substitutes silence so the peer keeps seeing packets (and the NAT
//! mapping stays alive). Received packets are decoded to 48 kHz and pushed
//! onto the RX channel; when the supervisor lags, frames are dropped rather
//! than blocking the media clock.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use voxgate_audio_core::{silence_frame, AudioFrame, FrameQueue, Reframer, SampleRate};

use crate::codec::MediaCodec;
use crate::error::{Result, TrunkError};

const RTP_VERSION: u8 = 2;
const RTP_HEADER_LEN: usize = 12;
const FRAME_INTERVAL: Duration = Duration::from_millis(20);

/// Fixed fields of an RTP packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    /// Payload type from negotiation
    pub payload_type: u8,
    /// Sequence number, increments by one per packet
    pub sequence: u16,
    /// Media timestamp at the codec clock rate
    pub timestamp: u32,
    /// Synchronization source identifier
    pub ssrc: u32,
    /// Marker bit (set on the first packet of a talkspurt)
    pub marker: bool,
}

impl RtpHeader {
    /// Serialize header and payload into one datagram
    pub fn build_packet(&self, payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::with_capacity(RTP_HEADER_LEN + payload.len());
        buf.put_u8(RTP_VERSION << 6);
        buf.put_u8((self.marker as u8) << 7 | (self.payload_type & 0x7F));
        buf.put_u16(self.sequence);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
        buf.put_slice(payload);
        buf
    }

    /// Parse a datagram; returns the header and the payload offset
    pub fn parse(buf: &[u8]) -> Result<(RtpHeader, usize)> {
        if buf.len() < RTP_HEADER_LEN {
            return Err(TrunkError::Protocol {
                reason: "short RTP packet".into(),
            });
        }
        let version = buf[0] >> 6;
        if version != RTP_VERSION {
            return Err(TrunkError::Protocol {
                reason: format!("RTP version {version}"),
            });
        }
        let csrc_count = (buf[0] & 0x0F) as usize;
        let has_extension = buf[0] & 0x10 != 0;
        let mut offset = RTP_HEADER_LEN + csrc_count * 4;

        if has_extension {
            if buf.len() < offset + 4 {
                return Err(TrunkError::Protocol {
                    reason: "truncated RTP extension".into(),
                });
            }
            let ext_words =
                u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]) as usize;
            offset += 4 + ext_words * 4;
        }
        if buf.len() < offset {
            return Err(TrunkError::Protocol {
                reason: "truncated RTP packet".into(),
            });
        }

        Ok((
            RtpHeader {
                payload_type: buf[1] & 0x7F,
                sequence: u16::from_be_bytes([buf[2], buf[3]]),
                timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
                ssrc: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
                marker: buf[1] & 0x80 != 0,
            },
            offset,
        ))
    }
}

/// Bind a UDP socket on the first free even port in the media window
pub async fn bind_media_port(
    local_ip: IpAddr,
    port_min: u16,
    port_max: u16,
) -> Result<UdpSocket> {
    let mut port = port_min;
    while port <= port_max {
        match UdpSocket::bind(SocketAddr::new(local_ip, port)).await {
            Ok(socket) => {
                debug!(port, "media port bound");
                return Ok(socket);
            }
            Err(_) => port += 2,
        }
    }
    Err(TrunkError::Media {
        reason: format!("no free media port in {port_min}-{port_max}"),
    })
}

/// Handles for one running media session
pub struct MediaSession {
    task: JoinHandle<()>,
    cancel: watch::Sender<bool>,
}

impl MediaSession {
    /// Stop the media loop; it drains briefly and exits
    pub fn stop(&self) {
        let _ = self.cancel.send(true);
    }

    /// Abort the task outright (teardown deadline exceeded)
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Spawn the RTP media loop for an accepted call.
///
/// `tx_queue` is drained at 20 ms cadence towards the peer; decoded caller
/// audio at 48 kHz is sent into `rx_tx`.
pub fn spawn_media_session(
    socket: UdpSocket,
    remote: SocketAddr,
    mut codec: MediaCodec,
    payload_type: u8,
    tx_queue: Arc<FrameQueue>,
    rx_tx: mpsc::Sender<AudioFrame>,
) -> MediaSession {
    let (cancel_tx, mut cancel_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let socket = Arc::new(socket);
        let ssrc: u32 = rand::random();
        let mut sequence: u16 = rand::random();
        let mut timestamp: u32 = rand::random();
        let ts_step = codec.timestamp_step();

        let mut interval = tokio::time::interval(FRAME_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut reframer = Reframer::new(SampleRate::Hz48000);
        let mut recv_buf = [0u8; 2048];
        let mut tx_clock_ms: u64 = 0;
        let mut first_packet = true;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let frame = tx_queue
                        .pop_now()
                        .unwrap_or_else(|| silence_frame(SampleRate::Hz48000, tx_clock_ms));
                    tx_clock_ms += 20;

                    let payload = match codec.encode_48k(&frame.samples) {
                        Ok(p) => p,
                        Err(e) => {
                            warn!(error = %e, "TX encode failed, dropping frame");
                            continue;
                        }
                    };
                    let header = RtpHeader {
                        payload_type,
                        sequence,
                        timestamp,
                        ssrc,
                        marker: first_packet,
                    };
                    first_packet = false;
                    sequence = sequence.wrapping_add(1);
                    timestamp = timestamp.wrapping_add(ts_step);

                    if let Err(e) = socket.send_to(&header.build_packet(&payload), remote).await {
                        warn!(error = %e, "RTP send failed");
                    }
                }

                recv = socket.recv_from(&mut recv_buf) => {
                    let (n, from) = match recv {
                        Ok(r) => r,
                        Err(e) => {
                            warn!(error = %e, "RTP recv failed");
                            continue;
                        }
                    };
                    // Latch onto the first source; symmetric RTP keeps NAT happy.
                    if from.ip() != remote.ip() {
                        trace!(from = %from, "RTP from unexpected source, ignored");
                        continue;
                    }
                    let (header, offset) = match RtpHeader::parse(&recv_buf[..n]) {
                        Ok(p) => p,
                        Err(e) => {
                            trace!(error = %e, "bad RTP packet");
                            continue;
                        }
                    };
                    if header.payload_type != payload_type {
                        // Comfort noise or a codec we did not negotiate.
                        continue;
                    }
                    let samples = match codec.decode_to_48k(&recv_buf[offset..n]) {
                        Ok(s) => s,
                        Err(e) => {
                            trace!(error = %e, "RX decode failed");
                            continue;
                        }
                    };
                    for frame in reframer.push_samples(&samples) {
                        if rx_tx.try_send(frame).is_err() {
                            trace!("RX channel full, frame dropped");
                        }
                    }
                }

                _ = cancel_rx.changed() => {
                    debug!("media session cancelled");
                    break;
                }
            }
        }
    });

    MediaSession {
        task,
        cancel: cancel_tx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = RtpHeader {
            payload_type: 111,
            sequence: 4242,
            timestamp: 960_000,
            ssrc: 0xDEAD_BEEF,
            marker: true,
        };
        let packet = header.build_packet(&[1, 2, 3]);
        let (parsed, offset) = RtpHeader::parse(&packet).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(&packet[offset..], &[1, 2, 3]);
    }

    #[test]
    fn short_packet_is_rejected() {
        assert!(RtpHeader::parse(&[0x80, 0, 0]).is_err());
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut packet = RtpHeader {
            payload_type: 0,
            sequence: 0,
            timestamp: 0,
            ssrc: 0,
            marker: false,
        }
        .build_packet(&[]);
        packet[0] = 0x40; // version 1
        assert!(RtpHeader::parse(&packet).is_err());
    }

    #[test]
    fn csrc_and_extension_shift_payload() {
        // version 2, 1 CSRC, extension present
        let mut buf = vec![0u8; RTP_HEADER_LEN + 4 + 4 + 4 + 2];
        buf[0] = (RTP_VERSION << 6) | 0x10 | 0x01;
        // extension header: profile 0, length 1 word
        let ext_at = RTP_HEADER_LEN + 4;
        buf[ext_at + 3] = 1;
        let (_, offset) = RtpHeader::parse(&buf).unwrap();
        assert_eq!(offset, RTP_HEADER_LEN + 4 + 4 + 4);
    }

    #[tokio::test]
    async fn media_port_allocation_respects_window() {
        let a = bind_media_port("127.0.0.1".parse().unwrap(), 4000, 4100)
            .await
            .unwrap();
        let port_a = a.local_addr().unwrap().port();
        assert!((4000..=4100).contains(&port_a));
        // Second allocation skips the occupied port.
        let b = bind_media_port("127.0.0.1".parse().unwrap(), port_a, 4100)
            .await
            .unwrap();
        assert_ne!(b.local_addr().unwrap().port(), port_a);
    }
}
