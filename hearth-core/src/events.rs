//! Audit event log
//!
//! Side-channel record of named events with structured payloads. Recording is
//! best-effort on the chat path: callers go through [`record_best_effort`],
//! which swallows sink failures so a broken log can never block or roll back
//! a conversation.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::{HearthError, Result};

/// A recorded audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// RFC 3339 timestamp, assigned at record time.
    pub ts: String,
    pub session_id: String,
    pub event: String,
    pub payload: serde_json::Value,
}

/// Sink for audit events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Record a named event with a structured payload.
    async fn record(&self, session_id: &str, event: &str, payload: serde_json::Value)
        -> Result<()>;
}

/// Record an event, swallowing failures.
///
/// The failure is logged at warn level and otherwise discarded; the caller's
/// control flow is unaffected.
pub async fn record_best_effort(
    sink: &dyn EventSink,
    session_id: &str,
    event: &str,
    payload: serde_json::Value,
) {
    if let Err(e) = sink.record(session_id, event, payload).await {
        tracing::warn!(event, error = %e, "event log write failed");
    }
}

/// Sink that drops every event.
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn record(
        &self,
        _session_id: &str,
        _event: &str,
        _payload: serde_json::Value,
    ) -> Result<()> {
        Ok(())
    }
}

/// Sink that collects events in memory, for tests and inspection.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    records: Mutex<Vec<EventRecord>>,
}

impl InMemoryEventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded event, in record order.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().expect("event log poisoned").clone()
    }
}

#[async_trait]
impl EventSink for InMemoryEventLog {
    async fn record(
        &self,
        session_id: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        let record = EventRecord {
            ts: Utc::now().to_rfc3339(),
            session_id: session_id.to_string(),
            event: event.to_string(),
            payload,
        };
        self.records.lock().expect("event log poisoned").push(record);
        Ok(())
    }
}

/// SQLite-backed audit log: one row per event in a `logs` table.
pub struct SqliteEventLog {
    db_path: PathBuf,
}

impl SqliteEventLog {
    /// Open (creating if needed) the database at `db_path` and initialize the
    /// `logs` table. Shares a database file with [`crate::store::SqliteStore`]
    /// without conflict; the tables are independent.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts TEXT NOT NULL,
                session_id TEXT NOT NULL,
                event TEXT NOT NULL,
                payload TEXT
            );
            "#,
        )?;

        Ok(Self { db_path })
    }

    /// The most recent `limit` events for a session, newest first.
    pub async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<EventRecord>> {
        let db_path = self.db_path.clone();
        let session_id = session_id.to_string();
        let limit = limit as i64;

        tokio::task::spawn_blocking(move || -> Result<Vec<EventRecord>> {
            let conn = Connection::open(&db_path)?;
            let mut stmt = conn.prepare(
                "SELECT ts, event, payload FROM logs WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![session_id, limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?;

            let mut records = Vec::new();
            for row in rows {
                let (ts, event, payload) = row?;
                records.push(EventRecord {
                    ts,
                    session_id: session_id.clone(),
                    event,
                    payload: parse_payload(payload),
                });
            }
            Ok(records)
        })
        .await
        .map_err(|e| HearthError::EventLog(format!("event log task failed: {e}")))?
    }

    /// Dump a session's full event history as JSONL, oldest first.
    pub async fn export(&self, session_id: &str) -> Result<String> {
        let db_path = self.db_path.clone();
        let session_id = session_id.to_string();

        tokio::task::spawn_blocking(move || -> Result<String> {
            let conn = Connection::open(&db_path)?;
            let mut stmt = conn.prepare(
                "SELECT ts, event, payload FROM logs WHERE session_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?;

            let mut lines = Vec::new();
            for row in rows {
                let (ts, event, payload) = row?;
                let record = serde_json::json!({
                    "ts": ts,
                    "session_id": session_id,
                    "event": event,
                    "payload": parse_payload(payload),
                });
                lines.push(serde_json::to_string(&record)?);
            }
            Ok(lines.join("\n"))
        })
        .await
        .map_err(|e| HearthError::EventLog(format!("event log task failed: {e}")))?
    }
}

fn parse_payload(payload: Option<String>) -> serde_json::Value {
    payload
        .and_then(|p| serde_json::from_str(&p).ok())
        .unwrap_or_else(|| serde_json::json!({}))
}

#[async_trait]
impl EventSink for SqliteEventLog {
    async fn record(
        &self,
        session_id: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        let db_path = self.db_path.clone();
        let session_id = session_id.to_string();
        let event = event.to_string();
        let payload = payload.to_string();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = Connection::open(&db_path)?;
            conn.execute(
                "INSERT INTO logs (ts, session_id, event, payload) VALUES (?1, ?2, ?3, ?4)",
                params![Utc::now().to_rfc3339(), session_id, event, payload],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| HearthError::EventLog(format!("event log task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_in_memory_log_collects_in_order() {
        tokio_test::block_on(async {
            let log = InMemoryEventLog::new();
            log.record("s", "first", serde_json::json!({"n": 1})).await.unwrap();
            log.record("s", "second", serde_json::json!({"n": 2})).await.unwrap();

            let records = log.records();
            assert_eq!(records.len(), 2);
            assert_eq!(records[0].event, "first");
            assert_eq!(records[1].payload["n"], 2);
        });
    }

    #[tokio::test]
    async fn test_sqlite_log_recent_is_newest_first() {
        let dir = TempDir::new().unwrap();
        let log = SqliteEventLog::new(dir.path().join("chat.db")).unwrap();

        for i in 0..5 {
            log.record("s", &format!("event_{i}"), serde_json::json!({}))
                .await
                .unwrap();
        }

        let recent = log.recent("s", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].event, "event_4");
        assert_eq!(recent[1].event, "event_3");
    }

    #[tokio::test]
    async fn test_export_is_jsonl_oldest_first() {
        let dir = TempDir::new().unwrap();
        let log = SqliteEventLog::new(dir.path().join("chat.db")).unwrap();

        log.record("s", "started", serde_json::json!({"a": 1})).await.unwrap();
        log.record("s", "finished", serde_json::json!({"b": 2})).await.unwrap();
        log.record("other", "ignored", serde_json::json!({})).await.unwrap();

        let dump = log.export("s").await.unwrap();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "started");
        assert_eq!(first["payload"]["a"], 1);
        assert_eq!(first["session_id"], "s");

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "finished");
    }

    #[tokio::test]
    async fn test_record_best_effort_swallows_failures() {
        struct FailingSink;

        #[async_trait]
        impl EventSink for FailingSink {
            async fn record(
                &self,
                _session_id: &str,
                _event: &str,
                _payload: serde_json::Value,
            ) -> Result<()> {
                Err(HearthError::EventLog("disk full".to_string()))
            }
        }

        // Must not panic or propagate.
        record_best_effort(&FailingSink, "s", "anything", serde_json::json!({})).await;
    }
}
