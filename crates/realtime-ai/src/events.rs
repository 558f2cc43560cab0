//! Downlink event model
//!
//! Server events arrive as JSON with a `type` discriminator. Only the
//! events the supervisor acts on are surfaced; everything else is logged
//! at trace level and dropped by the session's reader task.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;

/// A downlink event the supervisor cares about
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// `response.created` - a response is now in progress
    ResponseCreated,
    /// `response.audio.delta` - 24 kHz PCM16 bytes for the TX path
    AudioDelta(Vec<u8>),
    /// `response.audio_transcript.delta` - assistant transcript fragment
    AssistantTranscriptDelta(String),
    /// `conversation.item.input_audio_transcription.completed` - final
    /// caller transcript line
    CallerTranscript(String),
    /// `response.function_call_arguments.done` - a tool call to dispatch
    FunctionCall {
        /// Server-side id to echo into the function output item
        call_id: String,
        /// Tool name
        name: String,
        /// JSON-encoded arguments
        arguments: String,
    },
    /// `input_audio_buffer.speech_started` - caller interrupted
    SpeechStarted,
    /// `response.done` with the priced usage delta
    ResponseDone {
        /// Cost of this response in cents (0 when usage is absent)
        cost_delta_cents: f64,
    },
    /// `error` from the service
    ServerError {
        /// Error code, empty when absent
        code: String,
        /// Human-readable message
        message: String,
    },
    /// The websocket closed
    Disconnected,
}

/// Token counts extracted from a `response.done` usage block.
///
/// Vendor schemas differ on nesting; any missing field counts as zero
/// rather than guessing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageTokens {
    /// Input audio tokens
    pub input_audio: u64,
    /// Output audio tokens
    pub output_audio: u64,
}

/// Pull the audio-token usage out of a `response.done` payload
pub fn parse_usage(event: &Value) -> UsageTokens {
    let usage = &event["response"]["usage"];
    UsageTokens {
        input_audio: audio_tokens(&usage["input_token_details"])
            .unwrap_or_else(|| usage["input_tokens"].as_u64().unwrap_or(0)),
        output_audio: audio_tokens(&usage["output_token_details"])
            .unwrap_or_else(|| usage["output_tokens"].as_u64().unwrap_or(0)),
    }
}

fn audio_tokens(details: &Value) -> Option<u64> {
    details["audio_tokens"].as_u64()
}

/// Decode the base64 PCM in an audio delta event
pub fn parse_audio_delta(event: &Value) -> Option<Vec<u8>> {
    let b64 = event["delta"].as_str()?;
    BASE64.decode(b64).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn usage_prefers_audio_token_details() {
        let event = json!({
            "type": "response.done",
            "response": {
                "usage": {
                    "input_tokens": 500,
                    "output_tokens": 900,
                    "input_token_details": { "audio_tokens": 300, "text_tokens": 200 },
                    "output_token_details": { "audio_tokens": 800 }
                }
            }
        });
        let usage = parse_usage(&event);
        assert_eq!(usage.input_audio, 300);
        assert_eq!(usage.output_audio, 800);
    }

    #[test]
    fn missing_usage_counts_as_zero() {
        let event = json!({"type": "response.done", "response": {"status": "completed"}});
        assert_eq!(parse_usage(&event), UsageTokens::default());
    }

    #[test]
    fn flat_token_counts_are_a_fallback() {
        let event = json!({
            "type": "response.done",
            "response": { "usage": { "input_tokens": 42, "output_tokens": 7 } }
        });
        let usage = parse_usage(&event);
        assert_eq!(usage.input_audio, 42);
        assert_eq!(usage.output_audio, 7);
    }

    #[test]
    fn audio_delta_decodes_base64() {
        let event = json!({"type": "response.audio.delta", "delta": "AAEC"});
        assert_eq!(parse_audio_delta(&event).unwrap(), vec![0u8, 1, 2]);
        let bad = json!({"type": "response.audio.delta"});
        assert!(parse_audio_delta(&bad).is_none());
    }
}
