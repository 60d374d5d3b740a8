//! # Hearth - Chat with a Self-Compacting Memory
//!
//! Hearth is a small conversational front-end core: it persists dialogue
//! history per session, streams model responses, records audit events, and
//! keeps long conversations bounded by compacting older turns into a compact
//! memory note.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hearth_core::chat::ChatEngine;
//! use hearth_core::compactor::{CompactorConfig, MemoryCompactor};
//! use hearth_core::events::SqliteEventLog;
//! use hearth_core::llm::OllamaClient;
//! use hearth_core::store::SqliteStore;
//!
//! #[tokio::main]
//! async fn main() -> hearth_core::error::Result<()> {
//!     let store = Arc::new(SqliteStore::new("chat.db")?);
//!     let events = Arc::new(SqliteEventLog::new("chat.db")?);
//!     let client = Arc::new(OllamaClient::with_defaults()?);
//!
//!     let engine = ChatEngine::new(store, client, events)
//!         .with_compactor(MemoryCompactor::new(CompactorConfig::default()));
//!
//!     let reply = engine
//!         .send_streaming("default", "Tell me a story", |chunk| print!("{chunk}"))
//!         .await?;
//!     println!();
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **store**: append-only per-session turn log (SQLite or in-memory)
//! - **events**: best-effort audit log; failures never block the chat path
//! - **llm**: completion client (single-shot and streaming modes)
//! - **compactor**: rewrites an over-long conversation into one memory note
//!   plus the most recent turns, atomically
//! - **chat**: the per-session turn loop tying the above together
//! - **config**: file/env layered configuration

pub mod chat;
pub mod compactor;
pub mod config;
pub mod error;
pub mod events;
pub mod llm;
pub mod store;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::chat::{ChatEngine, ChatReply, new_session_id};
    pub use crate::compactor::{
        CompactionOutcome, CompactionReport, CompactorConfig, MEMORY_NOTE_MARKER, MemoryCompactor,
        build_compaction_prompt, render_transcript, total_chars,
    };
    pub use crate::config::{
        CompactionConfig, HearthConfig, LoggingConfig, ModelConfig, StorageConfig,
    };
    pub use crate::error::{HearthError, Result};
    pub use crate::events::{
        EventRecord, EventSink, InMemoryEventLog, NullEventSink, SqliteEventLog,
        record_best_effort,
    };
    pub use crate::llm::{
        CompletionClient, CompletionRequest, CompletionResponse, CompletionStream, Message,
        MessageRole, ModelInfo, OllamaClient, StubCompletionClient, TokenUsage,
        client_from_config,
    };
    pub use crate::store::{ConversationStore, InMemoryStore, Role, SqliteStore, Turn};
}
