//! Per-call agent manager
//!
//! One manager exists per supervisor and holds everything mutable about
//! agents for that call: the active descriptor, the unlock flag and the
//! gate's failure counter. Tool results are translated into
//! [`ToolOutcome`] here; sentinel strings never leave this module.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use voxgate_realtime_ai::ModelTier;

use crate::builtins::{MAIN_AGENT, SECURITY_AGENT};
use crate::descriptor::{
    parse_sentinel, AgentDescriptor, BuiltinTool, ToolKind, ToolOutcome,
};
use crate::error::{AgentError, Result};
use crate::registry::AgentRegistry;
use crate::tasks::TaskRegistry;

/// Failures of the gate before the call is dropped
pub const MAX_UNLOCK_FAILURES: u32 = 3;

/// Where failed unlock attempts are recorded (backed by the access store)
#[async_trait]
pub trait UnlockSink: Send + Sync {
    /// Persist one failed attempt for this caller
    async fn record_failed_unlock(&self, caller_id: &str, code_tried: &str);
}

/// Result of an agent switch
#[derive(Debug, Clone)]
pub struct SwitchOutcome {
    /// Previous agent name
    pub old: String,
    /// New agent name
    pub new: String,
    /// Whether this switch unlocked the call (gate -> main)
    pub unlocked_now: bool,
    /// The new agent's preferred model, for the supervisor to compare
    /// against the running session
    pub preferred_model: Option<ModelTier>,
}

/// Per-call mutable agent state
pub struct AgentManager {
    registry: Arc<AgentRegistry>,
    active: Arc<AgentDescriptor>,
    call_unlocked: bool,
    caller_id: String,
    unlock_code: String,
    unlock_failures: u32,
    unlock_sink: Arc<dyn UnlockSink>,
    tasks: Arc<TaskRegistry>,
}

impl AgentManager {
    /// Create the manager with the given initial agent
    pub fn new(
        registry: Arc<AgentRegistry>,
        initial_agent: &str,
        caller_id: impl Into<String>,
        unlock_code: impl Into<String>,
        unlock_sink: Arc<dyn UnlockSink>,
        tasks: Arc<TaskRegistry>,
    ) -> Result<Self> {
        let active = registry
            .get(initial_agent)
            .ok_or_else(|| AgentError::UnknownAgent {
                name: initial_agent.to_string(),
            })?;
        Ok(Self {
            registry,
            active,
            call_unlocked: false,
            caller_id: caller_id.into(),
            unlock_code: unlock_code.into(),
            unlock_failures: 0,
            unlock_sink,
            tasks,
        })
    }

    /// The currently active agent
    pub fn active(&self) -> &Arc<AgentDescriptor> {
        &self.active
    }

    /// Whether the unlock gate has been passed
    pub fn call_unlocked(&self) -> bool {
        self.call_unlocked
    }

    /// Gate failures so far in this call
    pub fn unlock_failures(&self) -> u32 {
        self.unlock_failures
    }

    /// Pre-unlock for whitelisted callers (skips the gate entirely)
    pub fn force_unlock(&mut self) {
        self.call_unlocked = true;
    }

    /// Whether the gate is the active agent
    pub fn in_gate(&self) -> bool {
        self.active.name == SECURITY_AGENT
    }

    /// Execute a tool call from the AI.
    ///
    /// Enforces the lock rule first: while the call is locked, only the
    /// security gate's own tools run; everything else is blocked without
    /// touching any handler.
    pub async fn execute_tool(&mut self, name: &str, args_json: &str) -> ToolOutcome {
        if !self.call_unlocked && !self.in_gate() {
            warn!(tool = name, "tool blocked: call is locked");
            return ToolOutcome::Blocked;
        }

        let Some(tool) = self.active.find_tool(name).cloned() else {
            debug!(tool = name, agent = %self.active.name, "unknown tool");
            return ToolOutcome::Reply(format!("Unknown tool: {name}"));
        };
        let args: Value = serde_json::from_str(args_json).unwrap_or(Value::Null);

        match tool.kind {
            ToolKind::Builtin(builtin) => self.execute_builtin(builtin, &args).await,
            ToolKind::Dynamic(handler) => {
                let result = self
                    .tasks
                    .run(&self.active.name, name, handler, args)
                    .await;
                match result {
                    Ok(raw) => parse_sentinel(&raw),
                    Err(AgentError::Cancelled) => {
                        ToolOutcome::Reply("The task was cancelled by the operator.".into())
                    }
                    Err(e) => ToolOutcome::Reply(format!("Tool failed: {e}")),
                }
            }
        }
    }

    async fn execute_builtin(&mut self, builtin: BuiltinTool, args: &Value) -> ToolOutcome {
        match builtin {
            BuiltinTool::Unlock => self.execute_unlock(args).await,
            BuiltinTool::SwitchAgent => {
                let target = args["agent"].as_str().unwrap_or("").to_string();
                match self.registry.get(&target) {
                    None => ToolOutcome::Reply(format!("There is no agent named {target}.")),
                    Some(agent) if agent.name == SECURITY_AGENT => {
                        ToolOutcome::Reply("That agent cannot be selected.".into())
                    }
                    Some(agent) => ToolOutcome::Switch(agent.name.clone()),
                }
            }
            BuiltinTool::SetModel => match args["model"]
                .as_str()
                .ok_or(())
                .and_then(|m| ModelTier::parse(m).map_err(|_| ()))
            {
                Ok(tier) => ToolOutcome::SetModel(tier),
                Err(()) => ToolOutcome::Reply(
                    "Unknown model. Available models: mini, premium.".into(),
                ),
            },
            BuiltinTool::EndCall => ToolOutcome::Hangup,
        }
    }

    async fn execute_unlock(&mut self, args: &Value) -> ToolOutcome {
        let code = args["code"].as_str().unwrap_or("").trim().to_string();
        if code == self.unlock_code {
            info!("unlock code accepted");
            return ToolOutcome::Switch(MAIN_AGENT.to_string());
        }

        self.unlock_failures += 1;
        warn!(
            failures = self.unlock_failures,
            "wrong unlock code"
        );
        self.unlock_sink
            .record_failed_unlock(&self.caller_id, &code)
            .await;

        if self.unlock_failures >= MAX_UNLOCK_FAILURES {
            ToolOutcome::Hangup
        } else {
            ToolOutcome::Beep
        }
    }

    /// Switch the active agent.
    ///
    /// Never touches the SIP dialog or the websocket; the supervisor
    /// re-sends the session configuration and handles any model change.
    /// Switching to the gate is forbidden, and a gate -> main transition
    /// unlocks the call.
    pub fn switch_to(&mut self, name: &str) -> Result<SwitchOutcome> {
        let target = self
            .registry
            .get(name)
            .ok_or_else(|| AgentError::UnknownAgent {
                name: name.to_string(),
            })?;
        if target.name == SECURITY_AGENT && !self.in_gate() {
            return Err(AgentError::RoutingForbidden {
                name: name.to_string(),
            });
        }

        let old = self.active.name.clone();
        let unlocked_now = self.in_gate() && target.name == MAIN_AGENT && !self.call_unlocked;
        if unlocked_now {
            self.call_unlocked = true;
        }
        let preferred_model = target.preferred_model;
        info!(old = %old, new = %target.name, unlocked_now, "agent switch");
        self.active = target;

        Ok(SwitchOutcome {
            old,
            new: self.active.name.clone(),
            unlocked_now,
            preferred_model,
        })
    }

    /// Session configuration for the active agent
    pub fn session_config(&self) -> voxgate_realtime_ai::AgentSessionConfig {
        voxgate_realtime_ai::AgentSessionConfig {
            instructions: self.active.instructions.clone(),
            tools: self.active.tool_schemas(),
        }
    }

}
