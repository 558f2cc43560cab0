//! Dashboard websocket
//!
//! On connect the client gets a full `status` snapshot, then the live
//! event stream. Commands flow the other way: parsed, validated and
//! routed to the active call's supervisor. Routing a switch to the
//! security gate is rejected here, before it ever reaches a call.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use voxgate_agent_core::SECURITY_AGENT;
use voxgate_call_engine::{DashboardCommand, SupervisorMsg};

use crate::state::ConsoleState;

/// `GET /ws` upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ConsoleState>) -> Response {
    ws.on_upgrade(|socket| handle_dashboard(socket, state))
}

async fn handle_dashboard(socket: WebSocket, state: ConsoleState) {
    info!("dashboard connected");
    let (mut sink, mut stream) = socket.split();

    // Full snapshot first, then the live stream.
    let status = state.status_event().await;
    if send_event(&mut sink, &status).await.is_err() {
        return;
    }

    let mut events = state.events.subscribe();
    let forward = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if send_event(&mut sink, &event).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // Slow consumer: drop what it missed, never the call.
                    warn!(missed, "dashboard lagging, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => handle_command_text(&text, &state).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    forward.abort();
    info!("dashboard disconnected");
}

async fn send_event(
    sink: &mut SplitSink<WebSocket, Message>,
    event: &voxgate_call_engine::DashboardEvent,
) -> Result<(), ()> {
    let text = serde_json::to_string(event).map_err(|_| ())?;
    sink.send(Message::Text(text)).await.map_err(|_| ())
}

async fn handle_command_text(text: &str, state: &ConsoleState) {
    let command: DashboardCommand = match serde_json::from_str(text) {
        Ok(cmd) => cmd,
        Err(e) => {
            debug!(error = %e, "unparseable dashboard command");
            return;
        }
    };
    if let Err(reason) = validate_command(&command) {
        warn!(reason = %reason, "dashboard command rejected");
        return;
    }

    let active = state.active_call.read().await;
    match active.as_ref() {
        Some(handle) => {
            if !handle.send(SupervisorMsg::Command(command)).await {
                debug!("supervisor gone, command dropped");
            }
        }
        None => debug!("no active call, command ignored"),
    }
}

/// Commands that must never reach a supervisor
pub fn validate_command(command: &DashboardCommand) -> Result<(), String> {
    if let DashboardCommand::SwitchAgent { agent_name } = command {
        if agent_name == SECURITY_AGENT {
            return Err(json!({
                "rejected": "switch_agent",
                "reason": "the security gate cannot be routed to",
            })
            .to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_to_gate_is_rejected() {
        let cmd = DashboardCommand::SwitchAgent {
            agent_name: SECURITY_AGENT.into(),
        };
        assert!(validate_command(&cmd).is_err());

        let ok = DashboardCommand::SwitchAgent {
            agent_name: "main_agent".into(),
        };
        assert!(validate_command(&ok).is_ok());
        assert!(validate_command(&DashboardCommand::Hangup).is_ok());
    }
}
