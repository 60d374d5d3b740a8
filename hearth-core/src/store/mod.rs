//! Conversation Storage
//!
//! Append-only turn log, keyed by session id. A conversation exists
//! implicitly: reading an unknown session yields the empty sequence, and the
//! first append creates it. Turns are never mutated in place; the only
//! destructive operations are `clear` and the compactor's `replace_all`.

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Speaker role for a stored turn.
///
/// `Other` carries any role string this crate does not produce itself (rows
/// written by other writers of a shared table). Such turns are stored and
/// read back untouched, but transcript rendering and tail rebuilding skip
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
    Other(String),
}

impl Role {
    /// Wire/storage representation of the role.
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Other(s) => s,
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => Role::Other(s),
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        Role::from(s.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single conversational unit: one message, tagged with a role.
///
/// Ordering is the sequence index in the store; the store may attach its own
/// timestamp column, but the turn itself carries none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    /// Create a new turn.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    /// Create a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Create an assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// Character length of the turn's text, counted as Unicode scalar values.
    pub fn chars(&self) -> usize {
        self.text.chars().count()
    }
}

/// Ordered, per-session turn log.
///
/// Implementations must preserve strict append order on read and must make
/// `replace_all` atomic: a concurrent reader of the same session sees either
/// the old sequence or the new one, never an empty or half-written state.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Read the full ordered turn sequence for a session (empty if unknown).
    async fn read(&self, session_id: &str) -> Result<Vec<Turn>>;

    /// Append one turn to the end of a session's log.
    async fn append(&self, session_id: &str, turn: Turn) -> Result<()>;

    /// Atomically replace the session's full contents with `turns`.
    ///
    /// Replace-or-nothing: on failure the prior sequence is still intact.
    async fn replace_all(&self, session_id: &str, turns: Vec<Turn>) -> Result<()>;

    /// Delete every turn for a session.
    async fn clear(&self, session_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        assert_eq!(Role::from("user"), Role::User);
        assert_eq!(Role::from("assistant"), Role::Assistant);
        assert_eq!(Role::from("tool"), Role::Other("tool".to_string()));

        let s: String = Role::Assistant.into();
        assert_eq!(s, "assistant");
        let s: String = Role::Other("system".to_string()).into();
        assert_eq!(s, "system");
    }

    #[test]
    fn test_role_serde_as_plain_string() {
        let json = serde_json::to_string(&Role::User).unwrap();
        assert_eq!(json, "\"user\"");

        let role: Role = serde_json::from_str("\"tool\"").unwrap();
        assert_eq!(role, Role::Other("tool".to_string()));
    }

    #[test]
    fn test_turn_chars_counts_scalar_values() {
        let turn = Turn::user("héllo");
        assert_eq!(turn.chars(), 5);

        let empty = Turn::assistant("");
        assert_eq!(empty.chars(), 0);
    }
}
