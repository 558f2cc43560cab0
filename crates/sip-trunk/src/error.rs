//! Error types for the SIP/RTP trunk

use thiserror::Error;

/// Errors raised by the trunk adapter
#[derive(Debug, Error)]
pub enum TrunkError {
    /// Transient network problem (socket error, unreachable peer)
    #[error("network error: {reason}")]
    Network {
        /// What failed
        reason: String,
    },

    /// The registrar rejected our credentials; permanent until reconfigured
    #[error("authentication rejected by registrar")]
    Auth,

    /// A signalling exchange got no answer in time
    #[error("timeout waiting for {what}")]
    Timeout {
        /// The exchange that timed out
        what: String,
    },

    /// A peer sent something we could not parse or that violates the dialog
    #[error("protocol violation: {reason}")]
    Protocol {
        /// What was malformed
        reason: String,
    },

    /// The SDP offer contained no codec we support
    #[error("no supported codec in offer")]
    CodecUnsupported,

    /// Media-path failure (RTP socket, codec library)
    #[error("media error: {reason}")]
    Media {
        /// What failed
        reason: String,
    },

    /// Invalid trunk configuration
    #[error("invalid configuration: {reason}")]
    Config {
        /// Which setting is wrong
        reason: String,
    },
}

impl From<std::io::Error> for TrunkError {
    fn from(e: std::io::Error) -> Self {
        TrunkError::Network {
            reason: e.to_string(),
        }
    }
}

/// Result alias for trunk operations
pub type Result<T> = std::result::Result<T, TrunkError>;
