//! Persisted record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of a call transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptLine {
    /// Speaker role: "user", "assistant" or "system"
    pub role: String,
    /// What was said
    pub text: String,
}

/// A call, created at INVITE acceptance and sealed at teardown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    /// Call id
    pub id: Uuid,
    /// Caller number
    pub caller_id: String,
    /// When the call was accepted
    pub started_at: DateTime<Utc>,
    /// When the call ended; `None` while active
    pub ended_at: Option<DateTime<Utc>>,
    /// Call duration in seconds
    pub duration_s: f64,
    /// Accumulated AI cost in cents
    pub cost_cents: f64,
    /// Conversation transcript in arrival order
    pub transcript: Vec<TranscriptLine>,
    /// Captured log records of this call
    pub logs: String,
}

impl CallRecord {
    /// Fresh record for an accepted call
    pub fn new(caller_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            caller_id: caller_id.into(),
            started_at: Utc::now(),
            ended_at: None,
            duration_s: 0.0,
            cost_cents: 0.0,
            transcript: Vec::new(),
            logs: String::new(),
        }
    }

    /// Seal the record at teardown
    pub fn finalize(&mut self, cost_cents: f64, logs: String) {
        let ended = Utc::now();
        self.duration_s = (ended - self.started_at).num_milliseconds() as f64 / 1000.0;
        self.ended_at = Some(ended);
        self.cost_cents = cost_cents;
        self.logs = logs;
    }
}

/// A blocked caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistEntry {
    /// Caller number
    pub caller_id: String,
    /// When the entry was created
    pub blocked_at: DateTime<Utc>,
    /// Why (operator note or `auto: 3 failed unlocks`)
    pub reason: String,
}

/// A caller that skips the security gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistEntry {
    /// Caller number
    pub caller_id: String,
    /// When the entry was created
    pub added_at: DateTime<Utc>,
    /// Optional operator note
    pub note: Option<String>,
}

/// One failed unlock attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedUnlock {
    /// Caller number
    pub caller_id: String,
    /// When the attempt happened
    pub ts: DateTime<Utc>,
    /// The wrong code that was tried
    pub code_tried: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_sets_end_and_duration() {
        let mut record = CallRecord::new("+4915901969502");
        assert!(record.ended_at.is_none());
        record.finalize(12.5, "log line".into());
        assert!(record.ended_at.is_some());
        assert!(record.duration_s >= 0.0);
        assert_eq!(record.cost_cents, 12.5);
        assert_eq!(record.logs, "log line");
    }
}
