//! Error types for the realtime AI session

use thiserror::Error;

/// Errors raised by the realtime session
#[derive(Debug, Error)]
pub enum AiError {
    /// Websocket connect/handshake failure
    #[error("connect failed: {reason}")]
    Connect {
        /// What failed
        reason: String,
    },

    /// The websocket dropped while the session was in use
    #[error("session disconnected")]
    Disconnected,

    /// The service sent something we could not interpret
    #[error("protocol error: {reason}")]
    Protocol {
        /// What was malformed
        reason: String,
    },

    /// Invalid session configuration
    #[error("invalid configuration: {reason}")]
    Config {
        /// Which setting is wrong
        reason: String,
    },
}

/// Result alias for session operations
pub type Result<T> = std::result::Result<T, AiError>;
