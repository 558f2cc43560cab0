//! Trunk-to-supervisor glue
//!
//! The [`AppHandler`] answers the trunk's callbacks: the admission
//! decision (blacklist, busy) before media, launching a supervisor when
//! media comes up, and relaying peer hangups and registration changes.
//! One call at a time: the active supervisor handle doubles as the busy
//! flag.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tracing::{error, info, warn};

use voxgate_call_engine::{
    CallContext, CallSupervisor, DashboardEvent, SupervisorMsg,
};
use voxgate_sip_trunk::{
    CallDecision, EstablishedCall, IncomingCall, RegistrationStatus, SipTrunk, TrunkHandler,
};
use voxgate_web_console::ConsoleState;

/// Glue between the trunk and the rest of the platform
pub struct AppHandler {
    console: ConsoleState,
    /// Everything a supervisor needs, minus the trunk itself
    trunk: OnceLock<Arc<SipTrunk>>,
    ai: voxgate_realtime_ai::RealtimeConfig,
    unlock_code: String,
}

impl AppHandler {
    /// New handler; the trunk is attached after it starts
    pub fn new(
        console: ConsoleState,
        ai: voxgate_realtime_ai::RealtimeConfig,
        unlock_code: String,
    ) -> Self {
        Self {
            console,
            trunk: OnceLock::new(),
            ai,
            unlock_code,
        }
    }

    /// Attach the started trunk (exactly once)
    pub fn attach_trunk(&self, trunk: Arc<SipTrunk>) {
        if self.trunk.set(trunk).is_err() {
            warn!("trunk attached twice, ignoring");
        }
    }

    fn publish(&self, event: DashboardEvent) {
        let _ = self.console.events.send(event);
    }
}

#[async_trait]
impl TrunkHandler for AppHandler {
    async fn on_incoming(&self, call: &IncomingCall) -> CallDecision {
        self.publish(DashboardEvent::CallIncoming {
            caller_id: call.caller_id.clone(),
        });

        // A node serves one call at a time.
        if self.console.active_call.read().await.is_some() {
            self.publish(DashboardEvent::CallRejected {
                caller_id: call.caller_id.clone(),
                reason: "busy".into(),
            });
            return CallDecision::Reject(486);
        }

        // Blacklist check runs before any media resource exists.
        match self.console.store.is_blacklisted(&call.caller_id).await {
            Ok(Some(entry)) => {
                info!(caller = %call.caller_id, reason = %entry.reason, "blacklisted caller rejected");
                self.publish(DashboardEvent::CallRejected {
                    caller_id: call.caller_id.clone(),
                    reason: format!("blacklist:{}", entry.reason),
                });
                CallDecision::Reject(403)
            }
            Ok(None) => CallDecision::Accept,
            Err(e) => {
                // Fail closed: without the access store there is no gate
                // bookkeeping either.
                error!(error = %e, "access store unavailable, rejecting call");
                self.publish(DashboardEvent::CallRejected {
                    caller_id: call.caller_id.clone(),
                    reason: "store_unavailable".into(),
                });
                CallDecision::Reject(486)
            }
        }
    }

    async fn on_established(&self, call: EstablishedCall) {
        let Some(trunk) = self.trunk.get() else {
            error!("media up before trunk attach, dropping call");
            return;
        };
        let ctx = CallContext {
            trunk: trunk.clone(),
            store: self.console.store.clone(),
            registry: self.console.registry.clone(),
            ai: self.ai.clone(),
            unlock_code: self.unlock_code.clone(),
            tasks: self.console.tasks.clone(),
            events: self.console.events.clone(),
        };

        let (handle, future) = CallSupervisor::launch(ctx, call);
        *self.console.active_call.write().await = Some(handle);

        let slot = self.console.active_call.clone();
        tokio::spawn(async move {
            if let Err(e) = future.await {
                error!(error = %e, "supervisor failed");
            }
            *slot.write().await = None;
        });
    }

    async fn on_call_ended(&self, call_id: &str) {
        let active = self.console.active_call.read().await;
        if let Some(handle) = active.as_ref() {
            if handle.call_id == call_id {
                handle.send(SupervisorMsg::PeerHangup).await;
            }
        }
    }

    async fn on_registration(&self, status: RegistrationStatus) {
        info!(status = ?status, "registration status");
        self.console.status.write().await.sip_registered = status.is_active();
        let snapshot = self.console.status_event().await;
        self.publish(snapshot);
    }
}
