//! Agent model for the voice platform
//!
//! An agent is a named bundle of instructions, tool schemas, tool handlers
//! and an optional preferred model. Agents are registered explicitly at
//! startup and are immutable for the process lifetime; per-call state (the
//! active agent, the unlock flag, the gate failure counter) lives in the
//! [`AgentManager`], one per supervisor.
//!
//! Tool handlers signal control flow through reserved return strings
//! (`__SWITCH__:<agent>`, `__BEEP__`, `__HANGUP__`). The manager parses
//! them into a [`ToolOutcome`] at the boundary; the raw sentinel never
//! travels further.

mod builtins;
mod descriptor;
mod error;
mod manager;
mod registry;
mod tasks;

pub use builtins::{builtin_registry, MAIN_AGENT, SECURITY_AGENT};
pub use descriptor::{
    parse_sentinel, AgentDescriptor, BuiltinTool, ToolDef, ToolHandler, ToolKind, ToolOutcome,
};
pub use error::{AgentError, Result};
pub use manager::{AgentManager, SwitchOutcome, UnlockSink};
pub use registry::AgentRegistry;
pub use tasks::{TaskRegistry, TaskState, ToolTask};
