//! Realtime AI session
//!
//! Maintains the persistent websocket to the realtime speech-to-speech
//! service: audio up, audio + transcripts + tool calls down, multiplexed
//! over one connection. The session owns the `response_in_progress` state
//! machine (every transition is driven by a server event) and can swap the
//! underlying model live by reconnecting without disturbing anything the
//! caller hears - the TX queue lives outside this crate.
//!
//! Wire shape: every 16 kHz uplink frame becomes an
//! `input_audio_buffer.append`; downlink events are parsed into
//! [`SessionEvent`]s for the supervisor. Usage reported on `response.done`
//! is priced per model tier and accumulated on the session.

mod error;
mod events;
mod model;
mod session;

pub use error::{AiError, Result};
pub use events::SessionEvent;
pub use model::{ModelTier, PriceTable, RealtimeConfig};
pub use session::{AgentSessionConfig, RealtimeSession, SessionState};
