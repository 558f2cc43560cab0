//! Error types for audio processing

use thiserror::Error;

/// Errors that can occur while handling PCM audio
#[derive(Debug, Error)]
pub enum AudioError {
    /// A sample rate outside the supported set was requested
    #[error("unsupported sample rate: {rate} Hz (supported: 8000, 16000, 24000, 48000)")]
    UnsupportedRate {
        /// The rejected rate in Hz
        rate: u32,
    },

    /// A frame did not contain exactly 20 ms of samples for its rate
    #[error("invalid frame size: got {actual} samples, expected {expected}")]
    InvalidFrameSize {
        /// Samples expected for a 20 ms frame at the frame's rate
        expected: usize,
        /// Samples actually present
        actual: usize,
    },
}

/// Result alias for audio operations
pub type Result<T> = std::result::Result<T, AudioError>;
