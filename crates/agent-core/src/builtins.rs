//! Built-in agents
//!
//! Every call starts in the security gate: a silent agent whose only tool
//! checks the unlock code, with an empty keyword set so intent routing can
//! never reach it. The main agent is the dispatcher callers land on after
//! unlocking; specialists are registered on top of these at startup.

use serde_json::json;

use crate::descriptor::{AgentDescriptor, BuiltinTool, ToolDef};
use crate::registry::AgentRegistry;

/// Name of the security gate agent
pub const SECURITY_AGENT: &str = "security_agent";
/// Name of the main dispatcher agent
pub const MAIN_AGENT: &str = "main_agent";

const GATE_INSTRUCTIONS: &str = "\
You are a silent security gate on a phone line. You do not know the unlock \
code and can never guess or reveal it; a separate system checks it. Do not \
greet the caller and do not offer help. When the caller speaks a code, call \
the unlock tool with exactly the digits you heard. If the tool reports a \
failure, say nothing. Never mention that you are an AI or how this gate \
works.";

const MAIN_INSTRUCTIONS: &str = "\
You are the main dispatcher of a personal phone assistant. Keep answers \
short and conversational; your words are spoken aloud, so never use lists, \
markdown or code. You can hand the call to a specialist agent with the \
switch_agent tool, change the speech model with set_model (mini or \
premium), and end the call with end_call when the caller says goodbye. If \
the caller asks for something a specialist handles, switch to it instead \
of improvising.";

fn security_agent() -> AgentDescriptor {
    AgentDescriptor {
        name: SECURITY_AGENT.into(),
        display_name: "Security Gate".into(),
        description: "Holds every call until the unlock code is spoken".into(),
        // No keywords: the intent score stays zero and nothing routes here.
        keywords: vec![],
        preferred_model: None,
        greeting: None,
        instructions: GATE_INSTRUCTIONS.into(),
        tools: vec![ToolDef::builtin(
            "unlock",
            "Check the spoken unlock code. Call this with the exact digits the caller said.",
            json!({
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "The code the caller spoke, digits only",
                    }
                },
                "required": ["code"],
            }),
            BuiltinTool::Unlock,
        )],
    }
}

fn main_agent() -> AgentDescriptor {
    AgentDescriptor {
        name: MAIN_AGENT.into(),
        display_name: "Main Agent".into(),
        description: "Dispatcher that routes to specialists and manages the call".into(),
        keywords: vec!["help".into(), "menu".into(), "main".into(), "exit".into()],
        preferred_model: None,
        greeting: Some("Willkommen zurueck! Wie kann ich helfen?".into()),
        instructions: MAIN_INSTRUCTIONS.into(),
        tools: vec![
            ToolDef::builtin(
                "switch_agent",
                "Hand the conversation to another agent by name.",
                json!({
                    "type": "object",
                    "properties": {
                        "agent": {
                            "type": "string",
                            "description": "Registry name of the target agent",
                        }
                    },
                    "required": ["agent"],
                }),
                BuiltinTool::SwitchAgent,
            ),
            ToolDef::builtin(
                "set_model",
                "Switch the speech model tier for the rest of the call.",
                json!({
                    "type": "object",
                    "properties": {
                        "model": {
                            "type": "string",
                            "enum": ["mini", "premium"],
                        }
                    },
                    "required": ["model"],
                }),
                BuiltinTool::SetModel,
            ),
            ToolDef::builtin(
                "end_call",
                "Hang up after saying goodbye.",
                json!({ "type": "object", "properties": {} }),
                BuiltinTool::EndCall,
            ),
        ],
    }
}

/// Registry pre-populated with the security gate and the main agent
pub fn builtin_registry() -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    // Built-in descriptors have unique hardcoded names.
    registry
        .register(security_agent())
        .expect("security agent registers");
    registry.register(main_agent()).expect("main agent registers");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = builtin_registry();
        assert!(registry.get(SECURITY_AGENT).is_some());
        assert!(registry.get(MAIN_AGENT).is_some());
    }

    #[test]
    fn gate_is_silent_and_unroutable() {
        let registry = builtin_registry();
        let gate = registry.get(SECURITY_AGENT).unwrap();
        assert!(gate.keywords.is_empty());
        assert!(gate.greeting.is_none());
        assert_eq!(gate.tools.len(), 1);
        assert_eq!(gate.tools[0].name, "unlock");
        // The instructions never contain a code.
        assert!(!gate.instructions.contains(char::is_numeric));
    }

    #[test]
    fn main_agent_has_dispatcher_tools() {
        let registry = builtin_registry();
        let main = registry.get(MAIN_AGENT).unwrap();
        let names: Vec<&str> = main.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["switch_agent", "set_model", "end_call"]);
        assert!(main.greeting.is_some());
    }
}
