//! Error types for agent management

use thiserror::Error;

/// Errors raised by the registry and manager
#[derive(Debug, Error)]
pub enum AgentError {
    /// The named agent is not registered
    #[error("unknown agent: {name}")]
    UnknownAgent {
        /// The requested name
        name: String,
    },

    /// An agent with this name is already registered
    #[error("agent already registered: {name}")]
    DuplicateAgent {
        /// The conflicting name
        name: String,
    },

    /// Routing to this agent is forbidden (the security gate)
    #[error("agent {name} cannot be routed to")]
    RoutingForbidden {
        /// The rejected target
        name: String,
    },

    /// A dynamic tool handler failed
    #[error("tool failed: {reason}")]
    Tool {
        /// Handler-reported reason
        reason: String,
    },

    /// A tool task was cancelled from the dashboard
    #[error("tool cancelled")]
    Cancelled,
}

/// Result alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;
