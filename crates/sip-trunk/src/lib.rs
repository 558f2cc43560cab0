//! SIP/RTP trunk adapter
//!
//! Registers a user agent against a PSTN trunk, answers inbound INVITEs and
//! bridges call audio as 20 ms frames at the fixed 48 kHz bridge clock rate.
//! The negotiated wire codec (Opus preferred, then PCMA, then PCMU) is an
//! internal concern of the media session; everything above this crate only
//! ever sees 48 kHz PCM.
//!
//! # Architecture
//!
//! One task owns the SIP signalling socket: registration with digest auth
//! and periodic refresh, the inbound INVITE dialog, BYE in both directions.
//! Each accepted call spawns a media task that paces RTP at 20 ms, decoding
//! received payloads onto the RX channel and draining the TX frame queue
//! (substituting silence when it starves so the NAT mapping stays alive).
//!
//! # NAT handling
//!
//! The configured public address is written into the Contact header and the
//! SDP `c=`/`o=` lines. A STUN probe helper is provided for operators that
//! need to discover that address at startup. RTP ports are allocated from a
//! configured window so the firewall can be kept narrow.

mod auth;
mod codec;
mod error;
mod message;
mod registration;
mod rtp;
mod sdp;
mod stun;
mod trunk;

pub use codec::MediaCodec;
pub use error::{Result, TrunkError};
pub use message::caller_id_from_header;
pub use registration::{RegisterFailure, RegistrationStatus};
pub use sdp::{select_codec, CodecKind, NegotiatedCodec, SdpOffer};
pub use stun::probe_public_address;
pub use trunk::{
    CallDecision, EstablishedCall, IncomingCall, SipTrunk, TrunkConfig, TrunkHandler,
};

/// Capacity of the TX queue (AI -> caller): 500 x 20 ms = 10 s of audio
pub const TX_QUEUE_FRAMES: usize = 500;
