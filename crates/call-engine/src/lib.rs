//! Per-call supervision
//!
//! One [`CallSupervisor`] exists per accepted INVITE. It owns every
//! resource of the call: the media queues between trunk and AI session,
//! the agent manager, the per-call log capture and the call record. When
//! the call ends - peer BYE, dashboard command, gate decision or AI
//! failure - the supervisor tears everything down deterministically and
//! seals the record.
//!
//! Dashboard integration is one-way fan-out ([`DashboardEvent`] over a
//! broadcast channel) plus a small command channel per call
//! ([`DashboardCommand`]).

mod error;
mod events;
mod logs;
mod supervisor;

pub use error::{EngineError, Result};
pub use events::{AiState, DashboardCommand, DashboardEvent, SupervisorMsg};
pub use logs::{CallLogHandle, CallLogLayer};
pub use supervisor::{CallContext, CallSupervisor, StoreUnlockSink, SupervisorHandle};

/// Capacity of the RX queue towards the AI (50 x 20 ms = 1 s)
pub const RX_QUEUE_FRAMES: usize = 50;
/// Silence in the security gate before the call is dropped
pub const GATE_TIMEOUT_SECS: u64 = 15;
