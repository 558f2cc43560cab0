//! Agent descriptors, tool definitions and the sentinel protocol

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use voxgate_realtime_ai::ModelTier;

use crate::error::AgentError;

/// Sentinel prefix requesting an agent switch
pub const SENTINEL_SWITCH: &str = "__SWITCH__:";
/// Sentinel requesting the confirmation beep
pub const SENTINEL_BEEP: &str = "__BEEP__";
/// Sentinel requesting call teardown
pub const SENTINEL_HANGUP: &str = "__HANGUP__";

/// Handler for a dynamically registered tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute with JSON arguments; the returned string goes back to the
    /// AI unless it is a sentinel
    async fn call(&self, args: Value) -> Result<String, AgentError>;
}

/// Tools the manager executes itself, with access to per-call state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTool {
    /// The security gate's code check
    Unlock,
    /// The dispatcher's agent switch
    SwitchAgent,
    /// Live model tier change
    SetModel,
    /// Polite hangup
    EndCall,
}

/// How a tool is executed
#[derive(Clone)]
pub enum ToolKind {
    /// Handled inside the manager
    Builtin(BuiltinTool),
    /// Delegated to a registered handler
    Dynamic(Arc<dyn ToolHandler>),
}

impl std::fmt::Debug for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolKind::Builtin(tool) => write!(f, "Builtin({tool:?})"),
            ToolKind::Dynamic(_) => write!(f, "Dynamic"),
        }
    }
}

/// One tool of an agent
#[derive(Debug, Clone)]
pub struct ToolDef {
    /// Wire name of the tool
    pub name: String,
    /// Description shown to the model
    pub description: String,
    /// JSON schema of the arguments
    pub parameters: Value,
    /// Execution strategy
    pub kind: ToolKind,
}

impl ToolDef {
    /// Define a builtin tool
    pub fn builtin(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        tool: BuiltinTool,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            kind: ToolKind::Builtin(tool),
        }
    }

    /// Define a dynamic tool backed by a handler
    pub fn dynamic(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            kind: ToolKind::Dynamic(handler),
        }
    }

    /// The tool in the realtime service's function format
    pub fn schema(&self) -> Value {
        json!({
            "type": "function",
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters,
        })
    }
}

/// Immutable description of one agent
#[derive(Debug, Clone)]
pub struct AgentDescriptor {
    /// Registry name (stable identifier)
    pub name: String,
    /// Human-readable name for the dashboard
    pub display_name: String,
    /// One-line description
    pub description: String,
    /// Intent keywords for routing; empty means unroutable
    pub keywords: Vec<String>,
    /// Model tier this agent prefers, if any
    pub preferred_model: Option<ModelTier>,
    /// Spoken greeting when this agent takes over (the gate stays silent)
    pub greeting: Option<String>,
    /// System prompt
    pub instructions: String,
    /// The agent's tools
    pub tools: Vec<ToolDef>,
}

impl AgentDescriptor {
    /// Tool schemas for the session configuration
    pub fn tool_schemas(&self) -> Vec<Value> {
        self.tools.iter().map(ToolDef::schema).collect()
    }

    /// Look up a tool by wire name
    pub fn find_tool(&self, name: &str) -> Option<&ToolDef> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Keyword hits of `text` against this agent.
    ///
    /// The security gate has no keywords, so its score is always zero and
    /// intent routing can never select it.
    pub fn intent_score(&self, text: &str) -> usize {
        let text = text.to_lowercase();
        self.keywords
            .iter()
            .filter(|kw| text.contains(&kw.to_lowercase()))
            .count()
    }
}

/// What the manager does with a tool result
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// Plain result text returned to the AI
    Reply(String),
    /// Switch the active agent
    Switch(String),
    /// Play the confirmation beep, muting the AI until its next response
    /// completes
    Beep,
    /// Tear the call down
    Hangup,
    /// Swap the model tier live
    SetModel(ModelTier),
    /// The call is locked and the tool is not the gate's
    Blocked,
}

/// Parse a handler return string, consuming sentinels at the boundary
pub fn parse_sentinel(raw: &str) -> ToolOutcome {
    if let Some(target) = raw.strip_prefix(SENTINEL_SWITCH) {
        return ToolOutcome::Switch(target.trim().to_string());
    }
    match raw {
        SENTINEL_BEEP => ToolOutcome::Beep,
        SENTINEL_HANGUP => ToolOutcome::Hangup,
        other => ToolOutcome::Reply(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_parse_to_variants() {
        assert_eq!(
            parse_sentinel("__SWITCH__:main_agent"),
            ToolOutcome::Switch("main_agent".into())
        );
        assert_eq!(parse_sentinel("__BEEP__"), ToolOutcome::Beep);
        assert_eq!(parse_sentinel("__HANGUP__"), ToolOutcome::Hangup);
        assert_eq!(
            parse_sentinel("the weather is fine"),
            ToolOutcome::Reply("the weather is fine".into())
        );
    }

    #[test]
    fn tool_schema_shape() {
        let tool = ToolDef::builtin(
            "unlock",
            "Check the unlock code",
            serde_json::json!({
                "type": "object",
                "properties": { "code": { "type": "string" } },
                "required": ["code"],
            }),
            BuiltinTool::Unlock,
        );
        let schema = tool.schema();
        assert_eq!(schema["type"], "function");
        assert_eq!(schema["name"], "unlock");
        assert_eq!(schema["parameters"]["required"][0], "code");
    }

    #[test]
    fn empty_keywords_never_score() {
        let gate = AgentDescriptor {
            name: "security_agent".into(),
            display_name: "Gate".into(),
            description: String::new(),
            keywords: vec![],
            preferred_model: None,
            greeting: None,
            instructions: String::new(),
            tools: vec![],
        };
        assert_eq!(gate.intent_score("please unlock security agent"), 0);
    }

    #[test]
    fn intent_score_counts_keyword_hits() {
        let coder = AgentDescriptor {
            name: "coder".into(),
            display_name: "Coder".into(),
            description: String::new(),
            keywords: vec!["code".into(), "program".into()],
            preferred_model: None,
            greeting: None,
            instructions: String::new(),
            tools: vec![],
        };
        assert_eq!(coder.intent_score("write a Program with some CODE"), 2);
        assert_eq!(coder.intent_score("hello"), 0);
    }
}
