//! SQLite-backed conversation store
//!
//! One row per turn in a `messages` table, ordered by rowid. Connections are
//! opened per operation and rusqlite calls run on the blocking thread pool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::{HearthError, Result};

use super::{ConversationStore, Role, Turn};

/// Conversation store persisted to a SQLite database.
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path` and initialize the
    /// `messages` table.
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
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_session
                ON messages(session_id, id);
            "#,
        )?;

        Ok(Self { db_path })
    }

    /// Path of the backing database file.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn read(&self, session_id: &str) -> Result<Vec<Turn>> {
        let db_path = self.db_path.clone();
        let session_id = session_id.to_string();

        tokio::task::spawn_blocking(move || -> Result<Vec<Turn>> {
            let conn = Connection::open(&db_path)?;
            let mut stmt = conn.prepare(
                "SELECT role, content FROM messages WHERE session_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![session_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut turns = Vec::new();
            for row in rows {
                let (role, text) = row?;
                turns.push(Turn::new(Role::from(role), text));
            }
            Ok(turns)
        })
        .await
        .map_err(|e| HearthError::Store(format!("storage task failed: {e}")))?
    }

    async fn append(&self, session_id: &str, turn: Turn) -> Result<()> {
        let db_path = self.db_path.clone();
        let session_id = session_id.to_string();
        let role: String = turn.role.into();
        let text = turn.text;

        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = Connection::open(&db_path)?;
            conn.execute(
                "INSERT INTO messages (session_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![session_id, role, text, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| HearthError::Store(format!("storage task failed: {e}")))?
    }

    async fn replace_all(&self, session_id: &str, turns: Vec<Turn>) -> Result<()> {
        let db_path = self.db_path.clone();
        let session_id = session_id.to_string();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = Connection::open(&db_path)?;

            // Delete and rewrite inside one transaction: concurrent readers
            // see either the old sequence or the new one, never the window
            // in between.
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM messages WHERE session_id = ?1",
                params![session_id],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO messages (session_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                )?;
                let now = Utc::now().to_rfc3339();
                for turn in &turns {
                    let role: String = turn.role.clone().into();
                    stmt.execute(params![session_id, role, turn.text, now])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| HearthError::Store(format!("storage task failed: {e}")))?
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        let db_path = self.db_path.clone();
        let session_id = session_id.to_string();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = Connection::open(&db_path)?;
            conn.execute(
                "DELETE FROM messages WHERE session_id = ?1",
                params![session_id],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| HearthError::Store(format!("storage task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = SqliteStore::new(dir.path().join("chat.db")).expect("Failed to open store");
        (store, dir)
    }

    #[tokio::test]
    async fn test_round_trip_preserves_order_and_roles() {
        let (store, _dir) = temp_store();

        store.append("s", Turn::user("hello")).await.unwrap();
        store.append("s", Turn::assistant("hi there")).await.unwrap();
        store
            .append("s", Turn::new(Role::from("tool"), "lookup result"))
            .await
            .unwrap();

        let turns = store.read("s").await.unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0], Turn::user("hello"));
        assert_eq!(turns[1], Turn::assistant("hi there"));
        assert_eq!(turns[2].role, Role::Other("tool".to_string()));
    }

    #[tokio::test]
    async fn test_replace_all_replaces_exactly() {
        let (store, _dir) = temp_store();

        for i in 0..5 {
            store.append("s", Turn::user(format!("old {i}"))).await.unwrap();
        }

        let rewritten = vec![Turn::assistant("note"), Turn::user("kept")];
        store.replace_all("s", rewritten.clone()).await.unwrap();

        assert_eq!(store.read("s").await.unwrap(), rewritten);
    }

    #[tokio::test]
    async fn test_replace_all_scoped_to_session() {
        let (store, _dir) = temp_store();

        store.append("a", Turn::user("for a")).await.unwrap();
        store.append("b", Turn::user("for b")).await.unwrap();

        store.replace_all("a", vec![Turn::assistant("rewritten")]).await.unwrap();

        assert_eq!(store.read("a").await.unwrap(), vec![Turn::assistant("rewritten")]);
        assert_eq!(store.read("b").await.unwrap(), vec![Turn::user("for b")]);
    }

    #[tokio::test]
    async fn test_clear() {
        let (store, _dir) = temp_store();

        store.append("s", Turn::user("hello")).await.unwrap();
        store.clear("s").await.unwrap();
        assert!(store.read("s").await.unwrap().is_empty());
    }
}
