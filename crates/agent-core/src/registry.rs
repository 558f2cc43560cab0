//! Explicit agent registration table
//!
//! Populated once at startup; descriptor identity is the string name.

use std::sync::Arc;

use crate::descriptor::AgentDescriptor;
use crate::error::{AgentError, Result};

/// Process-wide table of registered agents
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: Vec<Arc<AgentDescriptor>>,
}

impl AgentRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self { agents: Vec::new() }
    }

    /// Register an agent; names must be unique
    pub fn register(&mut self, descriptor: AgentDescriptor) -> Result<()> {
        if self.get(&descriptor.name).is_some() {
            return Err(AgentError::DuplicateAgent {
                name: descriptor.name,
            });
        }
        self.agents.push(Arc::new(descriptor));
        Ok(())
    }

    /// Look up an agent by name
    pub fn get(&self, name: &str) -> Option<Arc<AgentDescriptor>> {
        self.agents.iter().find(|a| a.name == name).cloned()
    }

    /// All agents in registration order
    pub fn list(&self) -> Vec<Arc<AgentDescriptor>> {
        self.agents.clone()
    }

    /// Best keyword match for an utterance, if any agent scores above zero
    pub fn route_by_intent(&self, text: &str) -> Option<Arc<AgentDescriptor>> {
        self.agents
            .iter()
            .map(|a| (a.intent_score(text), a))
            .filter(|(score, _)| *score > 0)
            .max_by_key(|(score, _)| *score)
            .map(|(_, a)| a.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(name: &str, keywords: &[&str]) -> AgentDescriptor {
        AgentDescriptor {
            name: name.into(),
            display_name: name.into(),
            description: String::new(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            preferred_model: None,
            greeting: None,
            instructions: String::new(),
            tools: vec![],
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = AgentRegistry::new();
        registry.register(agent("a", &[])).unwrap();
        assert!(matches!(
            registry.register(agent("a", &[])),
            Err(AgentError::DuplicateAgent { .. })
        ));
    }

    #[test]
    fn intent_routing_picks_highest_score() {
        let mut registry = AgentRegistry::new();
        registry.register(agent("gate", &[])).unwrap();
        registry.register(agent("coder", &["code"])).unwrap();
        registry
            .register(agent("ideas", &["idea", "note", "code"]))
            .unwrap();

        let routed = registry.route_by_intent("take a note of this idea").unwrap();
        assert_eq!(routed.name, "ideas");
        assert!(registry.route_by_intent("good morning").is_none());
    }
}
