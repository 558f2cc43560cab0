//! Error types for call supervision

use thiserror::Error;

/// Errors that abort a call (never the process)
#[derive(Debug, Error)]
pub enum EngineError {
    /// The AI session could not be established or re-established
    #[error("AI session failed: {0}")]
    Ai(#[from] voxgate_realtime_ai::AiError),

    /// Agent registry/manager failure
    #[error("agent error: {0}")]
    Agent(#[from] voxgate_agent_core::AgentError),

    /// Persistence failure
    #[error("store error: {0}")]
    Store(#[from] voxgate_access_store::StoreError),
}

/// Result alias for supervision
pub type Result<T> = std::result::Result<T, EngineError>;
