//! The SQLite store

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::types::{BlacklistEntry, CallRecord, FailedUnlock, TranscriptLine, WhitelistEntry};

/// Failures within the window that trigger auto-promotion
pub const AUTO_BLACKLIST_THRESHOLD: i64 = 3;
/// Reason written by the auto-promotion rule
pub const AUTO_BLACKLIST_REASON: &str = "auto: 3 failed unlocks";
/// Rolling window for counting unlock failures
const FAILURE_WINDOW_HOURS: i64 = 12;

// Columns added after the initial schema, applied by additive migration.
const ADDITIVE_COLUMNS: &[(&str, &str, &str)] = &[
    ("whitelist", "note", "TEXT"),
    ("calls", "cost_cents", "REAL NOT NULL DEFAULT 0"),
    ("calls", "logs", "TEXT NOT NULL DEFAULT ''"),
];

/// Shared handle to the embedded database
#[derive(Clone)]
pub struct AccessStore {
    pool: SqlitePool,
}

impl AccessStore {
    /// Open (creating if missing) and migrate the database at `path`
    pub async fn open(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .map_err(StoreError::Database)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        info!(path, "access store ready");
        Ok(store)
    }

    /// In-memory store for tests
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS calls (
                id TEXT PRIMARY KEY,
                caller_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                duration_s REAL NOT NULL DEFAULT 0,
                transcript TEXT NOT NULL DEFAULT '[]'
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS blacklist (
                caller_id TEXT PRIMARY KEY,
                blocked_at TEXT NOT NULL,
                reason TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS whitelist (
                caller_id TEXT PRIMARY KEY,
                added_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS failed_unlock_calls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                caller_id TEXT NOT NULL,
                ts TEXT NOT NULL,
                code_tried TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_failed_unlock_caller
             ON failed_unlock_calls (caller_id, ts)",
        )
        .execute(&self.pool)
        .await?;

        // Schema evolves by adding columns, never by rewriting tables.
        for (table, column, decl) in ADDITIVE_COLUMNS {
            if !self.column_exists(table, column).await? {
                debug!(table, column, "adding column");
                sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"))
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    async fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .any(|row| row.get::<String, _>("name") == column))
    }

    // ---- access lists --------------------------------------------------

    /// Blacklist entry for a caller, if any
    pub async fn is_blacklisted(&self, caller_id: &str) -> Result<Option<BlacklistEntry>> {
        let row = sqlx::query(
            "SELECT caller_id, blocked_at, reason FROM blacklist WHERE caller_id = ?",
        )
        .bind(caller_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| {
            Ok(BlacklistEntry {
                caller_id: r.get("caller_id"),
                blocked_at: r.get("blocked_at"),
                reason: r.get("reason"),
            })
        })
        .transpose()
    }

    /// Whitelist entry for a caller, if any
    pub async fn is_whitelisted(&self, caller_id: &str) -> Result<Option<WhitelistEntry>> {
        let row =
            sqlx::query("SELECT caller_id, added_at, note FROM whitelist WHERE caller_id = ?")
                .bind(caller_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|r| {
            Ok(WhitelistEntry {
                caller_id: r.get("caller_id"),
                added_at: r.get("added_at"),
                note: r.get("note"),
            })
        })
        .transpose()
    }

    /// Insert or replace a blacklist entry
    pub async fn add_blacklist(&self, caller_id: &str, reason: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO blacklist (caller_id, blocked_at, reason) VALUES (?, ?, ?)",
        )
        .bind(caller_id)
        .bind(Utc::now())
        .bind(reason)
        .execute(&self.pool)
        .await?;
        info!(caller = caller_id, reason, "caller blacklisted");
        Ok(())
    }

    /// Remove a blacklist entry, clearing the caller's failure history too
    pub async fn remove_blacklist(&self, caller_id: &str) -> Result<bool> {
        let removed = sqlx::query("DELETE FROM blacklist WHERE caller_id = ?")
            .bind(caller_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM failed_unlock_calls WHERE caller_id = ?")
            .bind(caller_id)
            .execute(&self.pool)
            .await?;
        Ok(removed > 0)
    }

    /// All blacklist entries, newest first
    pub async fn list_blacklist(&self) -> Result<Vec<BlacklistEntry>> {
        let rows = sqlx::query(
            "SELECT caller_id, blocked_at, reason FROM blacklist ORDER BY blocked_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| BlacklistEntry {
                caller_id: r.get("caller_id"),
                blocked_at: r.get("blocked_at"),
                reason: r.get("reason"),
            })
            .collect())
    }

    /// Insert or replace a whitelist entry
    pub async fn add_whitelist(&self, caller_id: &str, note: Option<&str>) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO whitelist (caller_id, added_at, note) VALUES (?, ?, ?)",
        )
        .bind(caller_id)
        .bind(Utc::now())
        .bind(note)
        .execute(&self.pool)
        .await?;
        info!(caller = caller_id, "caller whitelisted");
        Ok(())
    }

    /// Remove a whitelist entry
    pub async fn remove_whitelist(&self, caller_id: &str) -> Result<bool> {
        let removed = sqlx::query("DELETE FROM whitelist WHERE caller_id = ?")
            .bind(caller_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(removed > 0)
    }

    /// All whitelist entries, newest first
    pub async fn list_whitelist(&self) -> Result<Vec<WhitelistEntry>> {
        let rows = sqlx::query(
            "SELECT caller_id, added_at, note FROM whitelist ORDER BY added_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| WhitelistEntry {
                caller_id: r.get("caller_id"),
                added_at: r.get("added_at"),
                note: r.get("note"),
            })
            .collect())
    }

    // ---- unlock failures -----------------------------------------------

    /// Record one failed unlock attempt and apply the auto-promotion rule.
    ///
    /// Returns `true` when this attempt promoted the caller to the
    /// blacklist.
    pub async fn record_failed_unlock(&self, caller_id: &str, code_tried: &str) -> Result<bool> {
        sqlx::query(
            "INSERT INTO failed_unlock_calls (caller_id, ts, code_tried) VALUES (?, ?, ?)",
        )
        .bind(caller_id)
        .bind(Utc::now())
        .bind(code_tried)
        .execute(&self.pool)
        .await?;

        let window_start = Utc::now() - Duration::hours(FAILURE_WINDOW_HOURS);
        let recent: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM failed_unlock_calls WHERE caller_id = ? AND ts >= ?",
        )
        .bind(caller_id)
        .bind(window_start)
        .fetch_one(&self.pool)
        .await?
        .get("n");

        if recent >= AUTO_BLACKLIST_THRESHOLD {
            if self.is_blacklisted(caller_id).await?.is_none() {
                warn!(
                    caller = caller_id,
                    failures = recent,
                    "auto-promoting caller to blacklist"
                );
                self.add_blacklist(caller_id, AUTO_BLACKLIST_REASON).await?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Failure history for a caller, oldest first
    pub async fn failed_unlocks(&self, caller_id: &str) -> Result<Vec<FailedUnlock>> {
        let rows = sqlx::query(
            "SELECT caller_id, ts, code_tried FROM failed_unlock_calls
             WHERE caller_id = ? ORDER BY ts ASC",
        )
        .bind(caller_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| FailedUnlock {
                caller_id: r.get("caller_id"),
                ts: r.get("ts"),
                code_tried: r.get("code_tried"),
            })
            .collect())
    }

    // ---- call records --------------------------------------------------

    /// Insert the record of a freshly accepted call
    pub async fn insert_call(&self, record: &CallRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO calls (id, caller_id, started_at, ended_at, duration_s, cost_cents, transcript, logs)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(&record.caller_id)
        .bind(record.started_at)
        .bind(record.ended_at)
        .bind(record.duration_s)
        .bind(record.cost_cents)
        .bind(encode_transcript(&record.transcript)?)
        .bind(&record.logs)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Seal a call at teardown
    pub async fn finalize_call(&self, record: &CallRecord) -> Result<()> {
        sqlx::query(
            "UPDATE calls SET ended_at = ?, duration_s = ?, cost_cents = ?, transcript = ?, logs = ?
             WHERE id = ?",
        )
        .bind(record.ended_at)
        .bind(record.duration_s)
        .bind(record.cost_cents)
        .bind(encode_transcript(&record.transcript)?)
        .bind(&record.logs)
        .bind(record.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// One call with transcript and logs
    pub async fn get_call(&self, id: Uuid) -> Result<Option<CallRecord>> {
        let row = sqlx::query("SELECT * FROM calls WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode_call(&r)).transpose()
    }

    /// Recent calls, newest first
    pub async fn list_calls(&self, limit: i64) -> Result<Vec<CallRecord>> {
        let rows = sqlx::query("SELECT * FROM calls ORDER BY started_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_call).collect()
    }
}

fn encode_transcript(transcript: &[TranscriptLine]) -> Result<String> {
    serde_json::to_string(transcript).map_err(|e| StoreError::Corrupt {
        reason: format!("transcript encode: {e}"),
    })
}

fn decode_call(row: &sqlx::sqlite::SqliteRow) -> Result<CallRecord> {
    let id: String = row.get("id");
    let transcript: String = row.get("transcript");
    Ok(CallRecord {
        id: Uuid::parse_str(&id).map_err(|e| StoreError::Corrupt {
            reason: format!("call id: {e}"),
        })?,
        caller_id: row.get("caller_id"),
        started_at: row.get("started_at"),
        ended_at: row.get("ended_at"),
        duration_s: row.get("duration_s"),
        cost_cents: row.get("cost_cents"),
        transcript: serde_json::from_str(&transcript).map_err(|e| StoreError::Corrupt {
            reason: format!("transcript decode: {e}"),
        })?,
        logs: row.get("logs"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migration_is_idempotent_and_additive() {
        let store = AccessStore::open_in_memory().await.unwrap();
        // A second run must be a no-op.
        store.migrate().await.unwrap();
        assert!(store.column_exists("whitelist", "note").await.unwrap());
        assert!(store.column_exists("calls", "cost_cents").await.unwrap());
    }

    #[tokio::test]
    async fn access_lists_round_trip() {
        let store = AccessStore::open_in_memory().await.unwrap();
        store.add_blacklist("111", "spam").await.unwrap();
        store.add_whitelist("222", Some("family")).await.unwrap();

        assert_eq!(
            store.is_blacklisted("111").await.unwrap().unwrap().reason,
            "spam"
        );
        assert!(store.is_blacklisted("222").await.unwrap().is_none());
        assert_eq!(
            store.is_whitelisted("222").await.unwrap().unwrap().note,
            Some("family".to_string())
        );

        assert!(store.remove_blacklist("111").await.unwrap());
        assert!(!store.remove_blacklist("111").await.unwrap());
        assert_eq!(store.list_blacklist().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn third_failure_auto_promotes() {
        let store = AccessStore::open_in_memory().await.unwrap();
        assert!(!store.record_failed_unlock("333", "0000").await.unwrap());
        assert!(!store.record_failed_unlock("333", "1111").await.unwrap());
        assert!(store.record_failed_unlock("333", "2222").await.unwrap());

        let entry = store.is_blacklisted("333").await.unwrap().unwrap();
        assert_eq!(entry.reason, AUTO_BLACKLIST_REASON);
        assert_eq!(store.failed_unlocks("333").await.unwrap().len(), 3);

        // A fourth failure does not re-promote.
        assert!(!store.record_failed_unlock("333", "3333").await.unwrap());
    }

    #[tokio::test]
    async fn unblacklisting_clears_failure_history() {
        let store = AccessStore::open_in_memory().await.unwrap();
        for code in ["0", "1", "2"] {
            store.record_failed_unlock("444", code).await.unwrap();
        }
        assert!(store.is_blacklisted("444").await.unwrap().is_some());

        store.remove_blacklist("444").await.unwrap();
        assert!(store.is_blacklisted("444").await.unwrap().is_none());
        assert!(store.failed_unlocks("444").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn call_records_seal_once() {
        let store = AccessStore::open_in_memory().await.unwrap();
        let mut record = CallRecord::new("+4915901969502");
        record.transcript.push(TranscriptLine {
            role: "user".into(),
            text: "7234".into(),
        });
        store.insert_call(&record).await.unwrap();

        record.finalize(42.0, "captured logs".into());
        store.finalize_call(&record).await.unwrap();

        let loaded = store.get_call(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.caller_id, "+4915901969502");
        assert_eq!(loaded.cost_cents, 42.0);
        assert_eq!(loaded.transcript.len(), 1);
        assert_eq!(loaded.logs, "captured logs");
        assert!(loaded.ended_at.is_some());

        let listed = store.list_calls(10).await.unwrap();
        assert_eq!(listed.len(), 1);
    }
}
