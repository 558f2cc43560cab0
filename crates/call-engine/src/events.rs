//! Dashboard wire types
//!
//! Server-to-client events are broadcast to every connected dashboard;
//! client-to-server commands are routed to the active call's supervisor.
//! Both sides use `type`-tagged JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coarse state of the AI leg, for the dashboard's activity indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiState {
    /// No call active
    Idle,
    /// Waiting for caller speech
    Listening,
    /// Caller is speaking (server VAD)
    UserSpeaking,
    /// Response pending
    Thinking,
    /// Response audio streaming
    Speaking,
}

/// Server-to-client dashboard message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    /// Full status snapshot, sent on connect and on changes
    Status {
        /// Whether the trunk registration is active
        sip_registered: bool,
        /// Whether a call is in progress
        call_active: bool,
        /// Caller of the active call
        caller_id: Option<String>,
        /// Active agent of the active call
        active_agent: Option<String>,
        /// All registered agent names
        available_agents: Vec<String>,
        /// Current model tier
        current_model: String,
    },
    /// INVITE received, decision pending
    CallIncoming {
        /// Caller number
        caller_id: String,
    },
    /// Call accepted and media bridged
    CallActive {
        /// Caller number
        caller_id: String,
        /// Initial agent
        agent: String,
    },
    /// Call finished
    CallEnded {
        /// Teardown reason
        reason: String,
    },
    /// INVITE rejected before media
    CallRejected {
        /// Caller number
        caller_id: String,
        /// Rejection reason (`blacklist:<why>`, `busy`, ...)
        reason: String,
    },
    /// Transcript line or fragment
    Transcript {
        /// "user", "assistant" or "system"
        role: String,
        /// Text content
        text: String,
        /// Whether this is a final line (false for streaming deltas)
        is_final: bool,
    },
    /// The AI invoked a tool
    FunctionCall {
        /// Tool name
        name: String,
        /// Parsed arguments
        args: Value,
    },
    /// A tool finished
    FunctionResult {
        /// Tool name
        name: String,
        /// Result summary shown to the operator
        result: String,
    },
    /// The active agent changed
    AgentChanged {
        /// Previous agent
        old_agent: String,
        /// New agent
        new_agent: String,
    },
    /// AI activity indicator changed
    AiState {
        /// New state
        state: AiState,
    },
    /// Running cost update
    CallCost {
        /// Total cost of the call so far, cents
        cost_cents: f64,
    },
    /// Model tier changed mid-call
    ModelChanged {
        /// New tier name
        model: String,
    },
    /// The blacklist was modified
    BlacklistUpdated {},
    /// The whitelist was modified
    WhitelistUpdated {},
}

/// Client-to-server dashboard command
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardCommand {
    /// Tear the active call down
    Hangup,
    /// Suppress AI audio
    MuteAi,
    /// Restore AI audio
    UnmuteAi,
    /// Switch the active agent
    SwitchAgent {
        /// Target agent name
        agent_name: String,
    },
}

/// Everything the supervisor's command channel can carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorMsg {
    /// A dashboard command
    Command(DashboardCommand),
    /// The trunk reported the peer hung up
    PeerHangup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let event = DashboardEvent::CallIncoming {
            caller_id: "+4915901969502".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "call_incoming");
        assert_eq!(json["caller_id"], "+4915901969502");

        let state = DashboardEvent::AiState {
            state: AiState::UserSpeaking,
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["type"], "ai_state");
        assert_eq!(json["state"], "user_speaking");
    }

    #[test]
    fn commands_deserialize_from_tagged_json() {
        let cmd: DashboardCommand = serde_json::from_str(r#"{"type":"hangup"}"#).unwrap();
        assert_eq!(cmd, DashboardCommand::Hangup);

        let cmd: DashboardCommand =
            serde_json::from_str(r#"{"type":"switch_agent","agent_name":"main_agent"}"#).unwrap();
        assert_eq!(
            cmd,
            DashboardCommand::SwitchAgent {
                agent_name: "main_agent".into()
            }
        );

        assert!(serde_json::from_str::<DashboardCommand>(r#"{"type":"reboot"}"#).is_err());
    }
}
