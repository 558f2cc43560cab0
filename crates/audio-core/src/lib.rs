//! Audio primitives for the voxgate media pipeline
//!
//! Everything in the call path moves 20 ms frames of signed 16-bit mono PCM.
//! This crate owns the frame and format types, sample-rate conversion between
//! the rates the platform actually uses (8/16/24/48 kHz), the byte-stream
//! reframer that turns bursty decoder output back into fixed frames, tone
//! synthesis for the gate beep, and the bounded frame queues that cross task
//! boundaries.
//!
//! The telephony bridge always runs at 48 kHz; the AI leg takes 16 kHz in and
//! produces 24 kHz out. Conversion between those rates happens here and
//! nowhere else.

mod error;
pub mod queue;
mod resample;
mod tone;
mod types;

pub use error::{AudioError, Result};
pub use queue::FrameQueue;
pub use resample::{resample, Reframer};
pub use tone::{beep_frames, silence_frame, tone};
pub use types::{AudioFrame, SampleRate, FRAME_MS};
