//! The realtime session proper
//!
//! Two tasks own the split websocket: the writer drains an outbound
//! channel, the reader parses server events, updates the shared state
//! machine and forwards [`SessionEvent`]s. Every method on
//! [`RealtimeSession`] is a thin producer onto the outbound channel, so
//! the session can be driven from the supervisor loop without blocking.
//!
//! `response_in_progress` transitions only on server events:
//! `response.created` sets it, `response.done`, `speech_started` and a
//! disconnect clear it. The "conversation already has an active response"
//! error is handled as a recoverable race: back off 250 ms, re-check,
//! then re-issue the `response.create`.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::{http, Message};
use tokio_tungstenite::connect_async;
use tracing::{debug, trace, warn};

use voxgate_audio_core::{AudioFrame, SampleRate};

use crate::error::{AiError, Result};
use crate::events::{parse_audio_delta, parse_usage, SessionEvent};
use crate::model::{ModelTier, PriceTable, RealtimeConfig};

const ACTIVE_RESPONSE_BACKOFF: Duration = Duration::from_millis(250);
const TOOL_RESPONSE_DEADLINE: Duration = Duration::from_secs(5);
const OUTBOUND_CAPACITY: usize = 256;

/// Per-agent session configuration sent in `session.update`
#[derive(Debug, Clone)]
pub struct AgentSessionConfig {
    /// System prompt for the active agent
    pub instructions: String,
    /// Tool schemas in the service's function format
    pub tools: Vec<Value>,
}

/// Snapshot of the session state machine
#[derive(Debug, Clone, Copy)]
pub struct SessionState {
    /// Active model tier
    pub model: ModelTier,
    /// Whether a response is currently being generated
    pub response_in_progress: bool,
    /// Whether downlink audio is being suppressed
    pub muted: bool,
    /// Clear `muted` when the next response completes
    pub unmute_after_next_response: bool,
    /// Accumulated cost of this session in cents
    pub cost_cents: f64,
}

struct Shared {
    state: Mutex<SessionState>,
    prices: PriceTable,
}

impl Shared {
    fn response_in_progress(&self) -> bool {
        self.state.lock().response_in_progress
    }
}

/// Handle to a connected realtime session
pub struct RealtimeSession {
    config: RealtimeConfig,
    shared: Arc<Shared>,
    outbound: mpsc::Sender<Message>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl RealtimeSession {
    /// Connect, send the session configuration and start the IO tasks
    pub async fn connect(
        config: RealtimeConfig,
        tier: ModelTier,
        agent: &AgentSessionConfig,
        event_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState {
                model: tier,
                response_in_progress: false,
                muted: false,
                unmute_after_next_response: false,
                cost_cents: 0.0,
            }),
            prices: config.prices.clone(),
        });
        let (outbound, reader, writer) =
            start_io(&config, tier, agent, shared.clone(), event_tx.clone()).await?;
        Ok(Self {
            config,
            shared,
            outbound,
            event_tx,
            reader,
            writer,
        })
    }

    /// Snapshot of the state machine
    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    /// Whether a response is currently in progress
    pub fn response_in_progress(&self) -> bool {
        self.shared.response_in_progress()
    }

    /// Accumulated session cost in cents
    pub fn cost_cents(&self) -> f64 {
        self.shared.state.lock().cost_cents
    }

    /// Active model tier
    pub fn model(&self) -> ModelTier {
        self.shared.state.lock().model
    }

    /// Suppress or restore downlink audio
    pub fn set_muted(&self, muted: bool) {
        let mut state = self.shared.state.lock();
        state.muted = muted;
        if !muted {
            state.unmute_after_next_response = false;
        }
    }

    /// Mute now and unmute automatically when the next response completes
    pub fn mute_until_response_done(&self) {
        let mut state = self.shared.state.lock();
        state.muted = true;
        state.unmute_after_next_response = true;
    }

    /// Stream one 16 kHz uplink frame
    pub async fn append_audio(&self, frame: &AudioFrame) -> Result<()> {
        if frame.rate != SampleRate::Hz16000 {
            return Err(AiError::Config {
                reason: format!("uplink frames must be 16 kHz, got {}", frame.rate),
            });
        }
        let payload = json!({
            "type": "input_audio_buffer.append",
            "audio": BASE64.encode(frame.to_le_bytes()),
        });
        self.send(payload).await
    }

    /// Re-send the session configuration (agent switch)
    pub async fn update_agent(&self, agent: &AgentSessionConfig) -> Result<()> {
        let payload = session_update_payload(&self.config, agent);
        self.send(payload).await
    }

    /// Return a tool result to the conversation.
    ///
    /// The follow-up `response.create` is deferred while a response is in
    /// progress, bounded by a 5 s deadline, and runs off-loop so the
    /// supervisor is never blocked on it.
    pub async fn send_tool_output(&self, call_id: &str, output: &str) -> Result<()> {
        let item = json!({
            "type": "conversation.item.create",
            "item": {
                "type": "function_call_output",
                "call_id": call_id,
                "output": output,
            }
        });
        self.send(item).await?;

        let shared = self.shared.clone();
        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            let deadline = tokio::time::Instant::now() + TOOL_RESPONSE_DEADLINE;
            while shared.response_in_progress() && tokio::time::Instant::now() < deadline {
                tokio::time::sleep(ACTIVE_RESPONSE_BACKOFF).await;
            }
            let payload = json!({"type": "response.create"});
            let _ = outbound.send(Message::text(payload.to_string())).await;
        });
        Ok(())
    }

    /// Manually trigger a response, optionally with one-shot instructions
    /// (used for agent greetings)
    pub async fn create_response(&self, instructions: Option<&str>) -> Result<()> {
        let payload = match instructions {
            Some(text) => json!({"type": "response.create", "response": {"instructions": text}}),
            None => json!({"type": "response.create"}),
        };
        self.send(payload).await
    }

    /// Swap the model live: reconnect against the new model URL and
    /// replay the session configuration. Accumulated cost survives; the
    /// in-progress flag is cleared because the old socket is gone.
    pub async fn switch_model(
        &mut self,
        tier: ModelTier,
        agent: &AgentSessionConfig,
    ) -> Result<()> {
        debug!(tier = %tier, "switching model live");
        self.reader.abort();
        self.writer.abort();
        {
            let mut state = self.shared.state.lock();
            state.model = tier;
            state.response_in_progress = false;
        }
        let (outbound, reader, writer) = start_io(
            &self.config,
            tier,
            agent,
            self.shared.clone(),
            self.event_tx.clone(),
        )
        .await?;
        self.outbound = outbound;
        self.reader = reader;
        self.writer = writer;
        Ok(())
    }

    /// Close the websocket and stop the IO tasks
    pub async fn close(&mut self) {
        let _ = self.outbound.send(Message::Close(None)).await;
        self.shared.state.lock().response_in_progress = false;
        self.reader.abort();
        self.writer.abort();
    }

    async fn send(&self, payload: Value) -> Result<()> {
        self.outbound
            .send(Message::text(payload.to_string()))
            .await
            .map_err(|_| AiError::Disconnected)
    }
}

fn session_update_payload(config: &RealtimeConfig, agent: &AgentSessionConfig) -> Value {
    json!({
        "type": "session.update",
        "session": {
            "modalities": ["text", "audio"],
            "instructions": agent.instructions,
            "voice": config.voice,
            "input_audio_format": "pcm16",
            "output_audio_format": "pcm16",
            "input_audio_transcription": { "model": "whisper-1" },
            "turn_detection": { "type": "server_vad" },
            "tools": agent.tools,
            "tool_choice": "auto",
        }
    })
}

fn host_of(url: &str) -> &str {
    let rest = url
        .strip_prefix("wss://")
        .or_else(|| url.strip_prefix("ws://"))
        .unwrap_or(url);
    rest.split(['/', '?']).next().unwrap_or(rest)
}

async fn start_io(
    config: &RealtimeConfig,
    tier: ModelTier,
    agent: &AgentSessionConfig,
    shared: Arc<Shared>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
) -> Result<(mpsc::Sender<Message>, JoinHandle<()>, JoinHandle<()>)> {
    let url = config.url(tier);
    let request = http::Request::builder()
        .uri(&url)
        .header("Authorization", format!("Bearer {}", config.api_key))
        .header("OpenAI-Beta", "realtime=v1")
        .header("Host", host_of(&url))
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Version", "13")
        .header("Sec-WebSocket-Key", generate_key())
        .body(())
        .map_err(|e| AiError::Connect {
            reason: e.to_string(),
        })?;

    let (stream, response) = connect_async(request).await.map_err(|e| AiError::Connect {
        reason: e.to_string(),
    })?;
    debug!(
        model = config.model_id(tier),
        status = %response.status(),
        "realtime websocket connected"
    );
    let (mut sink, mut reader_stream) = stream.split();

    // The session configuration must be the first client message.
    let hello = session_update_payload(config, agent);
    sink.send(Message::text(hello.to_string()))
        .await
        .map_err(|e| AiError::Connect {
            reason: format!("session.update failed: {e}"),
        })?;

    let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let is_close = matches!(msg, Message::Close(_));
            if let Err(e) = sink.send(msg).await {
                warn!(error = %e, "websocket send failed");
                break;
            }
            if is_close {
                break;
            }
        }
    });

    let reader_out = out_tx.clone();
    let reader = tokio::spawn(async move {
        while let Some(next) = reader_stream.next().await {
            let msg = match next {
                Ok(m) => m,
                Err(e) => {
                    warn!(error = %e, "websocket read failed");
                    break;
                }
            };
            match msg {
                Message::Text(text) => {
                    handle_server_event(&text, &shared, &event_tx, &reader_out);
                }
                Message::Ping(data) => {
                    let _ = reader_out.send(Message::Pong(data)).await;
                }
                Message::Close(frame) => {
                    debug!(frame = ?frame, "websocket closed by server");
                    break;
                }
                _ => {}
            }
        }
        shared.state.lock().response_in_progress = false;
        let _ = event_tx.send(SessionEvent::Disconnected);
    });

    Ok((out_tx, reader, writer))
}

fn handle_server_event(
    text: &str,
    shared: &Arc<Shared>,
    event_tx: &mpsc::UnboundedSender<SessionEvent>,
    outbound: &mpsc::Sender<Message>,
) {
    let event: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "unparseable server event");
            return;
        }
    };
    let event_type = event["type"].as_str().unwrap_or("");

    match event_type {
        "response.created" => {
            shared.state.lock().response_in_progress = true;
            let _ = event_tx.send(SessionEvent::ResponseCreated);
        }
        "response.audio.delta" => {
            if shared.state.lock().muted {
                trace!("muted, dropping audio delta");
                return;
            }
            if let Some(pcm) = parse_audio_delta(&event) {
                let _ = event_tx.send(SessionEvent::AudioDelta(pcm));
            }
        }
        "response.audio_transcript.delta" => {
            if let Some(delta) = event["delta"].as_str() {
                let _ = event_tx.send(SessionEvent::AssistantTranscriptDelta(delta.to_string()));
            }
        }
        "conversation.item.input_audio_transcription.completed" => {
            if let Some(transcript) = event["transcript"].as_str() {
                let _ = event_tx.send(SessionEvent::CallerTranscript(transcript.to_string()));
            }
        }
        "response.function_call_arguments.done" => {
            let call_id = event["call_id"].as_str().unwrap_or("").to_string();
            let name = event["name"].as_str().unwrap_or("").to_string();
            let arguments = event["arguments"].as_str().unwrap_or("{}").to_string();
            let _ = event_tx.send(SessionEvent::FunctionCall {
                call_id,
                name,
                arguments,
            });
        }
        "input_audio_buffer.speech_started" => {
            shared.state.lock().response_in_progress = false;
            let _ = event_tx.send(SessionEvent::SpeechStarted);
        }
        "response.done" => {
            let usage = parse_usage(&event);
            let cost_delta = {
                let mut state = shared.state.lock();
                let delta = shared.prices.cost_cents(
                    state.model,
                    usage.input_audio,
                    usage.output_audio,
                );
                state.cost_cents += delta;
                state.response_in_progress = false;
                if state.unmute_after_next_response {
                    state.muted = false;
                    state.unmute_after_next_response = false;
                }
                delta
            };
            let _ = event_tx.send(SessionEvent::ResponseDone {
                cost_delta_cents: cost_delta,
            });
        }
        "error" => {
            let code = event["error"]["code"].as_str().unwrap_or("").to_string();
            let message = event["error"]["message"]
                .as_str()
                .unwrap_or("unknown")
                .to_string();
            warn!(code = %code, message = %message, "server error");

            if message.contains("already has an active response") {
                // Recoverable race with the server's own turn handling.
                let shared = shared.clone();
                let outbound = outbound.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(ACTIVE_RESPONSE_BACKOFF).await;
                    if !shared.response_in_progress() {
                        let payload = json!({"type": "response.create"});
                        let _ = outbound.send(Message::text(payload.to_string())).await;
                    }
                });
            }
            let _ = event_tx.send(SessionEvent::ServerError { code, message });
        }
        "session.created" | "session.updated" | "response.audio.done"
        | "response.audio_transcript.done" | "input_audio_buffer.speech_stopped"
        | "input_audio_buffer.committed" | "response.output_item.added"
        | "response.output_item.done" | "conversation.item.created"
        | "rate_limits.updated" | "response.content_part.added"
        | "response.content_part.done" => {
            trace!(event_type, "unactioned server event");
        }
        other => {
            debug!(event_type = other, "unknown server event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_shared() -> Arc<Shared> {
        Arc::new(Shared {
            state: Mutex::new(SessionState {
                model: ModelTier::Mini,
                response_in_progress: false,
                muted: false,
                unmute_after_next_response: false,
                cost_cents: 0.0,
            }),
            prices: PriceTable::default(),
        })
    }

    #[tokio::test]
    async fn response_lifecycle_drives_state() {
        let shared = test_shared();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (out_tx, _out_rx) = mpsc::channel(8);

        handle_server_event(
            r#"{"type":"response.created"}"#,
            &shared,
            &event_tx,
            &out_tx,
        );
        assert!(shared.response_in_progress());
        assert_eq!(event_rx.recv().await, Some(SessionEvent::ResponseCreated));

        handle_server_event(
            r#"{"type":"response.done","response":{"usage":{
                "input_token_details":{"audio_tokens":1000},
                "output_token_details":{"audio_tokens":1000}}}}"#,
            &shared,
            &event_tx,
            &out_tx,
        );
        assert!(!shared.response_in_progress());
        let state = *shared.state.lock();
        assert_eq!(state.cost_cents, 30.0);
        assert!(matches!(
            event_rx.recv().await,
            Some(SessionEvent::ResponseDone { cost_delta_cents }) if cost_delta_cents == 30.0
        ));
    }

    #[tokio::test]
    async fn speech_started_clears_in_progress() {
        let shared = test_shared();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (out_tx, _out_rx) = mpsc::channel(8);

        shared.state.lock().response_in_progress = true;
        handle_server_event(
            r#"{"type":"input_audio_buffer.speech_started"}"#,
            &shared,
            &event_tx,
            &out_tx,
        );
        assert!(!shared.response_in_progress());
        assert_eq!(event_rx.recv().await, Some(SessionEvent::SpeechStarted));
    }

    #[tokio::test]
    async fn muted_session_drops_audio_and_unmutes_after_response() {
        let shared = test_shared();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (out_tx, _out_rx) = mpsc::channel(8);

        {
            let mut state = shared.state.lock();
            state.muted = true;
            state.unmute_after_next_response = true;
        }
        handle_server_event(
            r#"{"type":"response.audio.delta","delta":"AAEC"}"#,
            &shared,
            &event_tx,
            &out_tx,
        );
        handle_server_event(
            r#"{"type":"response.done","response":{}}"#,
            &shared,
            &event_tx,
            &out_tx,
        );
        // The audio delta was suppressed; the first event is ResponseDone.
        assert!(matches!(
            event_rx.recv().await,
            Some(SessionEvent::ResponseDone { .. })
        ));
        let state = *shared.state.lock();
        assert!(!state.muted);
        assert!(!state.unmute_after_next_response);
    }

    #[tokio::test]
    async fn function_call_is_forwarded() {
        let shared = test_shared();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (out_tx, _out_rx) = mpsc::channel(8);

        handle_server_event(
            r#"{"type":"response.function_call_arguments.done",
                "call_id":"c1","name":"unlock","arguments":"{\"code\":\"7234\"}"}"#,
            &shared,
            &event_tx,
            &out_tx,
        );
        assert_eq!(
            event_rx.recv().await,
            Some(SessionEvent::FunctionCall {
                call_id: "c1".into(),
                name: "unlock".into(),
                arguments: "{\"code\":\"7234\"}".into(),
            })
        );
    }

    #[tokio::test]
    async fn active_response_race_triggers_backoff_retry() {
        let shared = test_shared();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::channel(8);

        handle_server_event(
            r#"{"type":"error","error":{"code":"conversation_already_has_active_response",
                "message":"Conversation already has an active response"}}"#,
            &shared,
            &event_tx,
            &out_tx,
        );
        assert!(matches!(
            event_rx.recv().await,
            Some(SessionEvent::ServerError { .. })
        ));
        // After the 250 ms backoff the session re-issues response.create.
        let retry = tokio::time::timeout(Duration::from_secs(1), out_rx.recv())
            .await
            .expect("retry within a second")
            .expect("message");
        match retry {
            Message::Text(text) => assert!(text.contains("response.create")),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn host_extraction() {
        assert_eq!(
            host_of("wss://api.openai.com/v1/realtime?model=x"),
            "api.openai.com"
        );
        assert_eq!(host_of("wss://gateway.local:8443/rt"), "gateway.local:8443");
    }

    #[test]
    fn session_update_shape() {
        let config = RealtimeConfig {
            api_key: "k".into(),
            base_url: "wss://x/v1".into(),
            voice: "alloy".into(),
            mini_model: "m".into(),
            premium_model: "p".into(),
            prices: PriceTable::default(),
        };
        let agent = AgentSessionConfig {
            instructions: "be brief".into(),
            tools: vec![json!({"type": "function", "name": "unlock"})],
        };
        let payload = session_update_payload(&config, &agent);
        assert_eq!(payload["type"], "session.update");
        assert_eq!(payload["session"]["turn_detection"]["type"], "server_vad");
        assert_eq!(payload["session"]["input_audio_format"], "pcm16");
        assert_eq!(payload["session"]["tools"][0]["name"], "unlock");
    }
}
