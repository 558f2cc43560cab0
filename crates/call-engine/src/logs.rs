//! Per-call log capture
//!
//! A [`CallLogLayer`] is installed once into the process subscriber. Log
//! records carry their call association through the span context: the
//! supervisor runs inside a span named `call` with a `call_id` field, and
//! any event emitted inside that span scope (or carrying its own
//! `call_id` field) is appended to the registered buffer for that call.
//! The buffer lives only for the call's duration; the collector is
//! detached at teardown and its contents sealed into the call record.

use std::fmt::Write as _;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::field::{Field, Visit};
use tracing::span::Attributes;
use tracing::{Event, Id, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

static BUFFERS: Lazy<DashMap<String, Arc<std::sync::Mutex<String>>>> = Lazy::new(DashMap::new);

/// Handle to one call's log buffer; dropping it detaches the collector
pub struct CallLogHandle {
    call_id: String,
    buffer: Arc<std::sync::Mutex<String>>,
}

impl CallLogHandle {
    /// Register a collector for `call_id`
    pub fn register(call_id: &str) -> Self {
        let buffer = Arc::new(std::sync::Mutex::new(String::new()));
        BUFFERS.insert(call_id.to_string(), buffer.clone());
        Self {
            call_id: call_id.to_string(),
            buffer,
        }
    }

    /// Take the captured text
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.buffer.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl Drop for CallLogHandle {
    fn drop(&mut self) {
        BUFFERS.remove(&self.call_id);
    }
}

fn append(call_id: &str, line: &str) {
    if let Some(buffer) = BUFFERS.get(call_id) {
        let mut guard = buffer.lock().unwrap_or_else(|e| e.into_inner());
        guard.push_str(line);
        guard.push('\n');
    }
}

// Span extension storing the call id of a `call` span.
struct CallId(String);

/// Layer routing events to per-call buffers
pub struct CallLogLayer;

impl CallLogLayer {
    /// New layer; install once next to the fmt layer
    pub fn new() -> Self {
        Self
    }
}

impl Default for CallLogLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for CallLogLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = FieldCollector::default();
        attrs.record(&mut visitor);
        if let Some(call_id) = visitor.call_id {
            if let Some(span) = ctx.span(id) {
                span.extensions_mut().insert(CallId(call_id));
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = FieldCollector::default();
        event.record(&mut visitor);

        // Prefer an explicit call_id field, fall back to the span scope.
        let call_id = visitor.call_id.clone().or_else(|| {
            ctx.event_scope(event).and_then(|scope| {
                scope
                    .from_root()
                    .find_map(|span| span.extensions().get::<CallId>().map(|c| c.0.clone()))
            })
        });
        let Some(call_id) = call_id else {
            return;
        };

        let meta = event.metadata();
        let mut line = format!("{} {}: {}", meta.level(), meta.target(), visitor.message);
        for (key, value) in &visitor.fields {
            let _ = write!(line, " {key}={value}");
        }
        append(&call_id, &line);
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    call_id: Option<String>,
    fields: Vec<(String, String)>,
}

impl FieldCollector {
    fn record_value(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            "call_id" => self.call_id = Some(value),
            name => self.fields.push((name.to_string(), value)),
        }
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_value(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_value(field, value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tracing::info;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    #[serial]
    fn events_inside_call_span_are_captured() {
        let subscriber = tracing_subscriber::registry().with(CallLogLayer::new());
        let handle = CallLogHandle::register("call-1");

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("call", call_id = "call-1");
            let _guard = span.enter();
            info!(frames = 3, "queue overflow");
        });

        let captured = handle.take();
        assert!(captured.contains("queue overflow"), "got: {captured}");
        assert!(captured.contains("frames=3"));
    }

    #[test]
    #[serial]
    fn field_tagged_events_are_captured_without_span() {
        let subscriber = tracing_subscriber::registry().with(CallLogLayer::new());
        let handle = CallLogHandle::register("call-2");

        tracing::subscriber::with_default(subscriber, || {
            info!(call_id = "call-2", "media up");
            info!(call_id = "call-other", "not ours");
        });

        let captured = handle.take();
        assert!(captured.contains("media up"));
        assert!(!captured.contains("not ours"));
    }

    #[test]
    #[serial]
    fn detached_collector_captures_nothing() {
        let subscriber = tracing_subscriber::registry().with(CallLogLayer::new());
        let handle = CallLogHandle::register("call-3");
        drop(handle);

        tracing::subscriber::with_default(subscriber, || {
            info!(call_id = "call-3", "late event");
        });
        // No panic, nothing to assert: the buffer is gone.
        assert!(BUFFERS.get("call-3").is_none());
    }
}
