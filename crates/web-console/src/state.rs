//! Shared dashboard state

use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use voxgate_access_store::AccessStore;
use voxgate_agent_core::{AgentRegistry, TaskRegistry};
use voxgate_call_engine::{DashboardEvent, SupervisorHandle};

/// Status fields the dashboard shows between events
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    /// Whether the trunk registration is active
    pub sip_registered: bool,
    /// Active agent of the current call
    pub active_agent: Option<String>,
    /// Current model tier name
    pub current_model: String,
}

/// State shared by every dashboard handler
#[derive(Clone)]
pub struct ConsoleState {
    /// Persistence
    pub store: AccessStore,
    /// Registered agents
    pub registry: Arc<AgentRegistry>,
    /// Tool task tracking
    pub tasks: Arc<TaskRegistry>,
    /// Event fan-out
    pub events: broadcast::Sender<DashboardEvent>,
    /// Handle to the active call's supervisor, if any
    pub active_call: Arc<RwLock<Option<SupervisorHandle>>>,
    /// Folded status for new connections
    pub status: Arc<RwLock<StatusSnapshot>>,
}

impl ConsoleState {
    /// Assemble the `status` event for a newly connected dashboard
    pub async fn status_event(&self) -> DashboardEvent {
        let status = self.status.read().await.clone();
        let active = self.active_call.read().await;
        DashboardEvent::Status {
            sip_registered: status.sip_registered,
            call_active: active.is_some(),
            caller_id: active.as_ref().map(|h| h.caller_id.clone()),
            active_agent: status.active_agent.clone(),
            available_agents: self.registry.list().iter().map(|a| a.name.clone()).collect(),
            current_model: if status.current_model.is_empty() {
                "mini".to_string()
            } else {
                status.current_model
            },
        }
    }

    /// Fold call events into the status snapshot so late-connecting
    /// dashboards see the current agent and model
    pub fn spawn_status_tracker(&self) -> tokio::task::JoinHandle<()> {
        let mut events = self.events.subscribe();
        let status = self.status.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let mut status = status.write().await;
                        match event {
                            DashboardEvent::CallActive { agent, .. } => {
                                status.active_agent = Some(agent);
                            }
                            DashboardEvent::AgentChanged { new_agent, .. } => {
                                status.active_agent = Some(new_agent);
                            }
                            DashboardEvent::ModelChanged { model } => {
                                status.current_model = model;
                            }
                            DashboardEvent::CallEnded { .. } => {
                                status.active_agent = None;
                            }
                            _ => {}
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!(missed = n, "status tracker lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
