//! The per-call supervisor
//!
//! Owns one accepted call end to end: wires the RX pipeline (trunk 48 kHz
//! -> 16 kHz -> AI), the TX pipeline (AI 24 kHz -> 48 kHz -> trunk queue)
//! and the event pipeline (AI events -> agent manager -> sentinel
//! handling), reacts to dashboard commands, enforces the gate inactivity
//! deadline and seals the call record on teardown.
//!
//! Loop layout per call: the trunk's media task (owned by sip-trunk), a
//! resampler task feeding the bounded RX queue, the session's reader task,
//! and the supervisor select loop below, which also drains the RX queue
//! into the uplink. A watch channel cancels the helper task; joins are
//! bounded so teardown can never hang.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};

use voxgate_access_store::{AccessStore, CallRecord, TranscriptLine};
use voxgate_agent_core::{
    AgentManager, AgentRegistry, SwitchOutcome, TaskRegistry, ToolOutcome, UnlockSink,
    MAIN_AGENT, SECURITY_AGENT,
};
use voxgate_audio_core::{beep_frames, resample, AudioFrame, FrameQueue, Reframer, SampleRate};
use voxgate_realtime_ai::{ModelTier, RealtimeConfig, RealtimeSession, SessionEvent};
use voxgate_sip_trunk::{EstablishedCall, SipTrunk};

use crate::error::Result;
use crate::events::{AiState, DashboardCommand, DashboardEvent, SupervisorMsg};
use crate::logs::CallLogHandle;
use crate::{GATE_TIMEOUT_SECS, RX_QUEUE_FRAMES};

const JOIN_DEADLINE: Duration = Duration::from_secs(2);
const MAX_AI_RECONNECTS: u32 = 3;

/// Shared dependencies a supervisor needs for one call
#[derive(Clone)]
pub struct CallContext {
    /// Trunk handle for the final hangup
    pub trunk: Arc<SipTrunk>,
    /// Persistence
    pub store: AccessStore,
    /// Registered agents
    pub registry: Arc<AgentRegistry>,
    /// Realtime endpoint settings
    pub ai: RealtimeConfig,
    /// The gate's secret
    pub unlock_code: String,
    /// Tool task tracking
    pub tasks: Arc<TaskRegistry>,
    /// Dashboard fan-out
    pub events: broadcast::Sender<DashboardEvent>,
}

impl CallContext {
    fn publish(&self, event: DashboardEvent) {
        // Fan-out is best-effort; no dashboard connected is fine.
        let _ = self.events.send(event);
    }
}

/// Handle the dashboard uses to command the active call
#[derive(Clone)]
pub struct SupervisorHandle {
    /// SIP Call-ID of the supervised call
    pub call_id: String,
    /// Caller number
    pub caller_id: String,
    msgs: mpsc::Sender<SupervisorMsg>,
}

impl SupervisorHandle {
    /// Deliver a message; returns false when the supervisor is gone
    pub async fn send(&self, msg: SupervisorMsg) -> bool {
        self.msgs.send(msg).await.is_ok()
    }
}

/// Records failed unlocks into the store and surfaces auto-promotions
pub struct StoreUnlockSink {
    store: AccessStore,
    events: broadcast::Sender<DashboardEvent>,
}

impl StoreUnlockSink {
    /// New sink over the shared store
    pub fn new(store: AccessStore, events: broadcast::Sender<DashboardEvent>) -> Self {
        Self { store, events }
    }
}

#[async_trait]
impl UnlockSink for StoreUnlockSink {
    async fn record_failed_unlock(&self, caller_id: &str, code_tried: &str) {
        match self.store.record_failed_unlock(caller_id, code_tried).await {
            Ok(true) => {
                let _ = self.events.send(DashboardEvent::BlacklistUpdated {});
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "failed to record unlock failure"),
        }
    }
}

/// Turns 24 kHz AI audio into 48 kHz frames on the trunk TX queue
struct TxPipeline {
    reframer: Reframer,
    tx: Arc<FrameQueue>,
    next_ts: u64,
}

impl TxPipeline {
    fn new(tx: Arc<FrameQueue>) -> Self {
        Self {
            reframer: Reframer::new(SampleRate::Hz24000),
            tx,
            next_ts: 0,
        }
    }

    /// Push raw 24 kHz PCM bytes from an audio delta
    fn push_pcm(&mut self, pcm: &[u8]) {
        for frame in self.reframer.push(pcm) {
            let samples = resample(&frame.samples, SampleRate::Hz24000, SampleRate::Hz48000);
            self.push_48k(samples);
        }
    }

    /// Push the cached gate beep
    fn push_beep(&mut self) {
        for frame in beep_frames() {
            self.push_48k(frame.samples.clone());
        }
    }

    fn push_48k(&mut self, samples: Vec<i16>) {
        let frame = AudioFrame {
            samples,
            rate: SampleRate::Hz48000,
            timestamp_ms: self.next_ts,
        };
        self.next_ts += 20;
        self.tx.push(frame);
    }

    /// Drop everything queued and buffered (caller interruption)
    fn flush(&mut self) {
        self.reframer.clear();
        self.tx.clear();
    }
}

/// Per-call supervisor; see the module docs
pub struct CallSupervisor;

impl CallSupervisor {
    /// Create the command channel and run a call to completion.
    ///
    /// Returns the handle for the dashboard and the join future; the
    /// caller (the accept loop) spawns the future and registers the
    /// handle.
    pub fn launch(
        ctx: CallContext,
        call: EstablishedCall,
    ) -> (
        SupervisorHandle,
        impl std::future::Future<Output = Result<CallRecord>>,
    ) {
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let handle = SupervisorHandle {
            call_id: call.call_id.clone(),
            caller_id: call.caller_id.clone(),
            msgs: msg_tx,
        };
        let future = Self::run(ctx, call, msg_rx);
        (handle, future)
    }

    async fn run(
        ctx: CallContext,
        call: EstablishedCall,
        msgs: mpsc::Receiver<SupervisorMsg>,
    ) -> Result<CallRecord> {
        let record = CallRecord::new(call.caller_id.as_str());
        let span = tracing::info_span!("call", call_id = %record.id);
        Self::run_inner(ctx, call, msgs, record).instrument(span).await
    }

    async fn run_inner(
        ctx: CallContext,
        call: EstablishedCall,
        mut msgs: mpsc::Receiver<SupervisorMsg>,
        mut record: CallRecord,
    ) -> Result<CallRecord> {
        let log_handle = CallLogHandle::register(&record.id.to_string());
        ctx.store.insert_call(&record).await?;

        // Whitelisted callers skip the gate entirely.
        let whitelisted = ctx.store.is_whitelisted(&call.caller_id).await?.is_some();
        let initial_agent = if whitelisted { MAIN_AGENT } else { SECURITY_AGENT };
        let sink = Arc::new(StoreUnlockSink::new(ctx.store.clone(), ctx.events.clone()));
        let mut manager = AgentManager::new(
            ctx.registry.clone(),
            initial_agent,
            call.caller_id.clone(),
            ctx.unlock_code.clone(),
            sink,
            ctx.tasks.clone(),
        )?;
        if whitelisted {
            manager.force_unlock();
            info!(caller = %call.caller_id, "whitelisted caller, gate skipped");
        }

        ctx.publish(DashboardEvent::CallActive {
            caller_id: call.caller_id.clone(),
            agent: manager.active().name.clone(),
        });

        // AI session with the initial agent; default model is mini.
        let tier = manager.active().preferred_model.unwrap_or(ModelTier::Mini);
        let (event_tx, mut session_events) = mpsc::unbounded_channel();
        let mut session =
            match RealtimeSession::connect(ctx.ai.clone(), tier, &manager.session_config(), event_tx)
                .await
            {
                Ok(session) => session,
                Err(e) => {
                    warn!(error = %e, "AI session connect failed, dropping call");
                    ctx.trunk.hangup(&call.call_id).await;
                    record.finalize(0.0, log_handle.take());
                    ctx.store.finalize_call(&record).await?;
                    ctx.publish(DashboardEvent::CallEnded {
                        reason: "ai_unavailable".into(),
                    });
                    return Ok(record);
                }
            };

        // RX pipeline: trunk 48 kHz -> resampler task -> bounded 16 kHz queue.
        let rx16 = FrameQueue::new("rx-16k", RX_QUEUE_FRAMES);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let resampler = spawn_rx_resampler(call.rx, rx16.clone(), cancel_rx);

        let mut tx_pipeline = TxPipeline::new(call.tx.clone());
        let mut ai_state = AiState::Listening;
        ctx.publish(DashboardEvent::AiState { state: ai_state });

        // Initial greeting: only outside the silent gate, only when idle.
        if let Some(greeting) = manager.active().greeting.clone() {
            if !manager.in_gate() && !session.response_in_progress() {
                let _ = session.create_response(Some(&greeting)).await;
            }
        }

        let gate_deadline = Instant::now() + Duration::from_secs(GATE_TIMEOUT_SECS);
        let mut gate_timer_armed = !whitelisted;
        let mut assistant_buffer = String::new();
        let mut reconnects: u32 = 0;
        let end_reason: String;

        loop {
            tokio::select! {
                biased;

                msg = msgs.recv() => match msg {
                    Some(SupervisorMsg::PeerHangup) | None => {
                        end_reason = "peer_hangup".into();
                        break;
                    }
                    Some(SupervisorMsg::Command(cmd)) => {
                        if let Some(reason) = handle_command(
                            cmd, &ctx, &mut manager, &mut session, &mut record,
                        ).await {
                            end_reason = reason;
                            break;
                        }
                    }
                },

                event = session_events.recv() => {
                    let Some(event) = event else {
                        end_reason = "ai_lost".into();
                        break;
                    };
                    match handle_session_event(
                        event, &ctx, &mut manager, &mut session, &mut record,
                        &mut tx_pipeline, &mut assistant_buffer, &mut ai_state,
                        &mut gate_timer_armed, &mut reconnects,
                    ).await {
                        EventVerdict::Continue => {}
                        EventVerdict::End(reason) => {
                            end_reason = reason;
                            break;
                        }
                    }
                },

                frame = rx16.pop_wait() => {
                    if let Err(e) = session.append_audio(&frame).await {
                        debug!(error = %e, "uplink append failed");
                    }
                },

                _ = tokio::time::sleep_until(gate_deadline), if gate_timer_armed => {
                    info!("no caller speech in the gate, hanging up");
                    end_reason = "gate_timeout".into();
                    break;
                },
            }
        }

        // Teardown: every loop observes the cancel signal or loses its
        // producer; joins are bounded.
        let _ = cancel_tx.send(true);
        ctx.trunk.hangup(&call.call_id).await;
        session.close().await;
        if tokio::time::timeout(JOIN_DEADLINE, resampler).await.is_err() {
            warn!("resampler task missed the join deadline, abandoned");
        }

        if !assistant_buffer.is_empty() {
            record.transcript.push(TranscriptLine {
                role: "assistant".into(),
                text: std::mem::take(&mut assistant_buffer),
            });
        }
        record.finalize(session.cost_cents(), log_handle.take());
        ctx.store.finalize_call(&record).await?;
        ctx.publish(DashboardEvent::CallCost {
            cost_cents: record.cost_cents,
        });
        ctx.publish(DashboardEvent::CallEnded {
            reason: end_reason.clone(),
        });
        ctx.publish(DashboardEvent::AiState {
            state: AiState::Idle,
        });
        info!(reason = %end_reason, cost_cents = record.cost_cents, "call finalized");
        Ok(record)
    }
}

fn spawn_rx_resampler(
    mut rx: mpsc::Receiver<AudioFrame>,
    rx16: Arc<FrameQueue>,
    mut cancel: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(
        async move {
            loop {
                tokio::select! {
                    maybe = rx.recv() => match maybe {
                        Some(frame) => {
                            let samples =
                                resample(&frame.samples, SampleRate::Hz48000, SampleRate::Hz16000);
                            rx16.push(AudioFrame {
                                samples,
                                rate: SampleRate::Hz16000,
                                timestamp_ms: frame.timestamp_ms,
                            });
                        }
                        None => break,
                    },
                    _ = cancel.changed() => break,
                }
            }
        }
        .in_current_span(),
    )
}

enum EventVerdict {
    Continue,
    End(String),
}

async fn handle_command(
    cmd: DashboardCommand,
    ctx: &CallContext,
    manager: &mut AgentManager,
    session: &mut RealtimeSession,
    record: &mut CallRecord,
) -> Option<String> {
    match cmd {
        DashboardCommand::Hangup => {
            info!("dashboard requested hangup");
            return Some("dashboard_hangup".into());
        }
        DashboardCommand::MuteAi => session.set_muted(true),
        DashboardCommand::UnmuteAi => session.set_muted(false),
        DashboardCommand::SwitchAgent { agent_name } => {
            match manager.switch_to(&agent_name) {
                Ok(outcome) => {
                    apply_switch(ctx, manager, session, record, outcome).await;
                }
                Err(e) => warn!(agent = %agent_name, error = %e, "dashboard switch rejected"),
            }
        }
    }
    None
}

#[allow(clippy::too_many_arguments)]
async fn handle_session_event(
    event: SessionEvent,
    ctx: &CallContext,
    manager: &mut AgentManager,
    session: &mut RealtimeSession,
    record: &mut CallRecord,
    tx_pipeline: &mut TxPipeline,
    assistant_buffer: &mut String,
    ai_state: &mut AiState,
    gate_timer_armed: &mut bool,
    reconnects: &mut u32,
) -> EventVerdict {
    match event {
        SessionEvent::ResponseCreated => {
            set_ai_state(ctx, ai_state, AiState::Thinking);
        }
        SessionEvent::AudioDelta(pcm) => {
            tx_pipeline.push_pcm(&pcm);
            set_ai_state(ctx, ai_state, AiState::Speaking);
        }
        SessionEvent::AssistantTranscriptDelta(delta) => {
            assistant_buffer.push_str(&delta);
            ctx.publish(DashboardEvent::Transcript {
                role: "assistant".into(),
                text: delta,
                is_final: false,
            });
        }
        SessionEvent::CallerTranscript(text) => {
            *gate_timer_armed = false;
            record.transcript.push(TranscriptLine {
                role: "user".into(),
                text: text.clone(),
            });
            ctx.publish(DashboardEvent::Transcript {
                role: "user".into(),
                text,
                is_final: true,
            });
            set_ai_state(ctx, ai_state, AiState::Thinking);
        }
        SessionEvent::SpeechStarted => {
            // Caller interruption: stop what is queued, immediately.
            *gate_timer_armed = false;
            tx_pipeline.flush();
            set_ai_state(ctx, ai_state, AiState::UserSpeaking);
        }
        SessionEvent::FunctionCall {
            call_id,
            name,
            arguments,
        } => {
            let args: serde_json::Value =
                serde_json::from_str(&arguments).unwrap_or(serde_json::Value::Null);
            ctx.publish(DashboardEvent::FunctionCall {
                name: name.clone(),
                args,
            });
            let outcome = manager.execute_tool(&name, &arguments).await;
            return handle_tool_outcome(
                ctx, manager, session, record, tx_pipeline, &name, &call_id, outcome,
            )
            .await;
        }
        SessionEvent::ResponseDone { cost_delta_cents } => {
            if !assistant_buffer.is_empty() {
                let text = std::mem::take(assistant_buffer);
                record.transcript.push(TranscriptLine {
                    role: "assistant".into(),
                    text: text.clone(),
                });
                ctx.publish(DashboardEvent::Transcript {
                    role: "assistant".into(),
                    text,
                    is_final: true,
                });
            }
            if cost_delta_cents > 0.0 {
                record.cost_cents = session.cost_cents();
            }
            ctx.publish(DashboardEvent::CallCost {
                cost_cents: session.cost_cents(),
            });
            set_ai_state(ctx, ai_state, AiState::Listening);
        }
        SessionEvent::ServerError { code, message } => {
            debug!(code = %code, message = %message, "AI server error");
        }
        SessionEvent::Disconnected => {
            if *reconnects >= MAX_AI_RECONNECTS {
                warn!("AI session lost and reconnect budget spent");
                return EventVerdict::End("ai_lost".into());
            }
            *reconnects += 1;
            let delay = Duration::from_secs(1 << (*reconnects - 1).min(4));
            warn!(attempt = *reconnects, delay_s = delay.as_secs(), "AI disconnected, reconnecting");
            tokio::time::sleep(delay).await;
            let tier = session.model();
            if let Err(e) = session.switch_model(tier, &manager.session_config()).await {
                warn!(error = %e, "AI reconnect failed");
                if *reconnects >= MAX_AI_RECONNECTS {
                    return EventVerdict::End("ai_lost".into());
                }
            }
        }
    }
    EventVerdict::Continue
}

#[allow(clippy::too_many_arguments)]
async fn handle_tool_outcome(
    ctx: &CallContext,
    manager: &mut AgentManager,
    session: &mut RealtimeSession,
    record: &mut CallRecord,
    tx_pipeline: &mut TxPipeline,
    tool: &str,
    call_id: &str,
    outcome: ToolOutcome,
) -> EventVerdict {
    match outcome {
        ToolOutcome::Reply(text) => {
            ctx.publish(DashboardEvent::FunctionResult {
                name: tool.into(),
                result: text.clone(),
            });
            if let Err(e) = session.send_tool_output(call_id, &text).await {
                debug!(error = %e, "tool output send failed");
            }
        }
        ToolOutcome::Blocked => {
            ctx.publish(DashboardEvent::FunctionResult {
                name: tool.into(),
                result: "blocked".into(),
            });
            let _ = session
                .send_tool_output(call_id, "Tool locked. The call has not been unlocked.")
                .await;
        }
        ToolOutcome::Switch(target) => match manager.switch_to(&target) {
            Ok(outcome) => {
                ctx.publish(DashboardEvent::FunctionResult {
                    name: tool.into(),
                    result: format!("switch:{target}"),
                });
                apply_switch(ctx, manager, session, record, outcome).await;
            }
            Err(e) => {
                warn!(target = %target, error = %e, "switch failed");
                let _ = session
                    .send_tool_output(call_id, &format!("Cannot switch: {e}"))
                    .await;
            }
        },
        ToolOutcome::Beep => {
            ctx.publish(DashboardEvent::FunctionResult {
                name: tool.into(),
                result: "beep".into(),
            });
            tx_pipeline.push_beep();
            session.mute_until_response_done();
        }
        ToolOutcome::Hangup => {
            ctx.publish(DashboardEvent::FunctionResult {
                name: tool.into(),
                result: "hangup".into(),
            });
            let reason = if manager.in_gate() && !manager.call_unlocked() {
                "security_failed"
            } else {
                "agent_hangup"
            };
            return EventVerdict::End(reason.into());
        }
        ToolOutcome::SetModel(tier) => {
            if tier == session.model() {
                let _ = session
                    .send_tool_output(call_id, "That model is already active.")
                    .await;
                return EventVerdict::Continue;
            }
            // Confirm to the old conversation first; the swap discards the
            // server-side context.
            let _ = session
                .send_tool_output(call_id, "Switching the model now.")
                .await;
            match session.switch_model(tier, &manager.session_config()).await {
                Ok(()) => {
                    ctx.publish(DashboardEvent::ModelChanged {
                        model: tier.to_string(),
                    });
                    ctx.publish(DashboardEvent::FunctionResult {
                        name: tool.into(),
                        result: format!("model:{tier}"),
                    });
                    if !session.response_in_progress() {
                        let _ = session
                            .create_response(Some(
                                "Tell the caller the model switch is complete and continue.",
                            ))
                            .await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "model switch failed");
                    return EventVerdict::End("ai_lost".into());
                }
            }
        }
    }
    EventVerdict::Continue
}

async fn apply_switch(
    ctx: &CallContext,
    manager: &mut AgentManager,
    session: &mut RealtimeSession,
    record: &mut CallRecord,
    outcome: SwitchOutcome,
) {
    if outcome.old == outcome.new {
        return;
    }
    ctx.publish(DashboardEvent::AgentChanged {
        old_agent: outcome.old.clone(),
        new_agent: outcome.new.clone(),
    });
    let note = format!("agent: {} -> {}", outcome.old, outcome.new);
    record.transcript.push(TranscriptLine {
        role: "system".into(),
        text: note.clone(),
    });
    ctx.publish(DashboardEvent::Transcript {
        role: "system".into(),
        text: note,
        is_final: true,
    });

    // New tools and instructions on the running session.
    if let Err(e) = session.update_agent(&manager.session_config()).await {
        warn!(error = %e, "session reconfigure failed");
    }

    // Hot-swap when the new agent prefers a different tier.
    if let Some(tier) = outcome.preferred_model {
        if tier != session.model() {
            match session.switch_model(tier, &manager.session_config()).await {
                Ok(()) => ctx.publish(DashboardEvent::ModelChanged {
                    model: tier.to_string(),
                }),
                Err(e) => warn!(error = %e, "preferred-model swap failed"),
            }
        }
    }

    // Greeting rule: never for the silent gate, never over a running
    // response (server VAD will drive it instead).
    if let Some(greeting) = manager.active().greeting.clone() {
        if !manager.in_gate() && !session.response_in_progress() {
            let _ = session.create_response(Some(&greeting)).await;
        }
    }
}

fn set_ai_state(ctx: &CallContext, current: &mut AiState, next: AiState) {
    if *current != next {
        *current = next;
        ctx.publish(DashboardEvent::AiState { state: next });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_pipeline_emits_only_960_sample_48k_frames() {
        let queue = FrameQueue::new("tx-test", 32);
        let mut pipeline = TxPipeline::new(queue.clone());

        // 1.5 frames of 24 kHz PCM bytes, in two pushes.
        let bytes_24k = SampleRate::Hz24000.bytes_per_frame();
        pipeline.push_pcm(&vec![0u8; bytes_24k]);
        pipeline.push_pcm(&vec![0u8; bytes_24k]);

        let mut stamps = Vec::new();
        while let Some(frame) = queue.pop_now() {
            assert_eq!(frame.rate, SampleRate::Hz48000);
            assert_eq!(frame.samples.len(), 960);
            stamps.push(frame.timestamp_ms);
        }
        assert_eq!(stamps, vec![0, 20]);
    }

    #[test]
    fn tx_pipeline_timestamps_survive_model_swap_boundary() {
        // The pipeline is owned by the supervisor, not the session, so a
        // swap never resets it: stamps stay contiguous.
        let queue = FrameQueue::new("tx-test", 32);
        let mut pipeline = TxPipeline::new(queue.clone());
        let bytes_24k = SampleRate::Hz24000.bytes_per_frame();

        pipeline.push_pcm(&vec![0u8; bytes_24k * 2]);
        // (model swap happens here in real flow: nothing touches the queue)
        pipeline.push_pcm(&vec![0u8; bytes_24k]);

        let stamps: Vec<u64> = std::iter::from_fn(|| queue.pop_now())
            .map(|f| f.timestamp_ms)
            .collect();
        assert_eq!(stamps, vec![0, 20, 40]);
    }

    #[test]
    fn beep_lands_on_tx_queue() {
        let queue = FrameQueue::new("tx-test", 32);
        let mut pipeline = TxPipeline::new(queue.clone());
        pipeline.push_beep();
        assert_eq!(queue.len(), beep_frames().len());
        let first = queue.pop_now().unwrap();
        assert!(!first.is_silence());
        assert_eq!(first.samples.len(), 960);
    }

    #[test]
    fn flush_clears_queue_and_tail() {
        let queue = FrameQueue::new("tx-test", 32);
        let mut pipeline = TxPipeline::new(queue.clone());
        let bytes_24k = SampleRate::Hz24000.bytes_per_frame();
        pipeline.push_pcm(&vec![0u8; bytes_24k + 10]);
        assert_eq!(queue.len(), 1);

        pipeline.flush();
        assert!(queue.is_empty());
        assert_eq!(pipeline.reframer.buffered_bytes(), 0);
    }

    #[tokio::test]
    async fn unlock_sink_publishes_blacklist_update_on_promotion() {
        let store = AccessStore::open_in_memory().await.unwrap();
        let (events, mut events_rx) = broadcast::channel(16);
        let sink = StoreUnlockSink::new(store.clone(), events);

        sink.record_failed_unlock("555", "0000").await;
        sink.record_failed_unlock("555", "1111").await;
        sink.record_failed_unlock("555", "2222").await;

        // Exactly one BlacklistUpdated, on the third failure.
        let event = events_rx.recv().await.unwrap();
        assert!(matches!(event, DashboardEvent::BlacklistUpdated {}));
        assert!(events_rx.try_recv().is_err());
        assert!(store.is_blacklisted("555").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rx_resampler_converts_to_16k() {
        let (tx, rx) = mpsc::channel(8);
        let rx16 = FrameQueue::new("rx-test", 8);
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let task = spawn_rx_resampler(rx, rx16.clone(), cancel_rx);

        tx.send(AudioFrame {
            samples: vec![100; 960],
            rate: SampleRate::Hz48000,
            timestamp_ms: 40,
        })
        .await
        .unwrap();
        drop(tx);
        task.await.unwrap();

        let frame = rx16.pop_now().unwrap();
        assert_eq!(frame.rate, SampleRate::Hz16000);
        assert_eq!(frame.samples.len(), 320);
        assert_eq!(frame.timestamp_ms, 40);
    }
}
