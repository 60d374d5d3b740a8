//! In-memory conversation store

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;

use super::{ConversationStore, Turn};

/// Conversation store backed by a per-session `Vec<Turn>`.
///
/// Used by tests and as a no-persistence mode. `replace_all` swaps the whole
/// vector under the write lock, so readers never observe a partial rewrite.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sessions: RwLock<HashMap<String, Vec<Turn>>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn read(&self, session_id: &str) -> Result<Vec<Turn>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }

    async fn append(&self, session_id: &str, turn: Turn) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.entry(session_id.to_string()).or_default().push(turn);
        Ok(())
    }

    async fn replace_all(&self, session_id: &str, turns: Vec<Turn>) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.to_string(), turns);
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_session_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.read("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = InMemoryStore::new();
        store.append("s", Turn::user("one")).await.unwrap();
        store.append("s", Turn::assistant("two")).await.unwrap();
        store.append("s", Turn::user("three")).await.unwrap();

        let turns = store.read("s").await.unwrap();
        let texts: Vec<&str> = turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let store = InMemoryStore::new();
        store.append("a", Turn::user("for a")).await.unwrap();
        store.append("b", Turn::user("for b")).await.unwrap();

        assert_eq!(store.read("a").await.unwrap().len(), 1);
        assert_eq!(store.read("b").await.unwrap().len(), 1);

        store.clear("a").await.unwrap();
        assert!(store.read("a").await.unwrap().is_empty());
        assert_eq!(store.read("b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_all_swaps_contents() {
        let store = InMemoryStore::new();
        store.append("s", Turn::user("old")).await.unwrap();

        store
            .replace_all("s", vec![Turn::assistant("new")])
            .await
            .unwrap();

        let turns = store.read("s").await.unwrap();
        assert_eq!(turns, vec![Turn::assistant("new")]);
    }
}
