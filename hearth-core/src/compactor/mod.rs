//! Conversation memory compaction.
//!
//! When a conversation's total character length grows past a configured
//! limit, the compactor summarizes the full transcript through the completion
//! client and atomically rewrites the stored history as one memory note plus
//! the last few turns verbatim. Below the limit it does nothing; if the
//! summarization call fails, the stored history is untouched.

pub mod config;
pub mod engine;
pub mod outcome;

pub use config::CompactorConfig;
pub use engine::{
    MEMORY_NOTE_MARKER, MemoryCompactor, build_compaction_prompt, render_transcript, total_chars,
};
pub use outcome::{CompactionOutcome, CompactionReport};
