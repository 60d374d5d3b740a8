use serde::{Deserialize, Serialize};

/// Audit payload for a successful compaction.
///
/// Exactly these four fields, with exactly these meanings, are emitted in the
/// `memory_summarized` event; external audit consumers depend on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionReport {
    /// Total character length of the conversation before the rewrite.
    pub pre_chars: usize,

    /// Total character length after the rewrite (note plus tail).
    pub post_chars: usize,

    /// Number of tail turns carried across the rewrite. Counted before role
    /// filtering, so a non-user/assistant turn inside the tail window still
    /// counts even though it is not re-appended.
    pub kept_messages: usize,

    /// Character length of the raw summary text (0 if the model returned
    /// nothing).
    pub summary_chars: usize,
}

/// Result of one compaction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// Conversation at or below the limit; nothing was touched.
    NoOp,

    /// History was rewritten to a memory note plus the verbatim tail.
    Compacted(CompactionReport),

    /// The summarization call failed or timed out; the conversation was left
    /// completely untouched.
    Failed { error: String },
}

impl CompactionOutcome {
    /// Whether this pass rewrote history.
    pub fn is_compacted(&self) -> bool {
        matches!(self, CompactionOutcome::Compacted(_))
    }

    /// Whether this pass declined to act (below threshold).
    pub fn is_noop(&self) -> bool {
        matches!(self, CompactionOutcome::NoOp)
    }

    /// Whether the summarization call failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, CompactionOutcome::Failed { .. })
    }
}
