use tokio::time::timeout;

use crate::error::Result;
use crate::events::{record_best_effort, EventSink};
use crate::llm::CompletionClient;
use crate::store::{ConversationStore, Role, Turn};

use super::config::CompactorConfig;
use super::outcome::{CompactionOutcome, CompactionReport};

/// Marker prefixed to every synthesized memory note.
pub const MEMORY_NOTE_MARKER: &str = "[MEMORY SUMMARY]";

/// Sum of character lengths across every turn's text.
///
/// Characters are Unicode scalar values; an empty text counts zero.
pub fn total_chars(turns: &[Turn]) -> usize {
    turns.iter().map(|t| t.chars()).sum()
}

/// Render turns as a flat transcript, one `"Role: text"` line per turn,
/// joined with single newlines in original order.
///
/// Turns whose role is neither user nor assistant are silently skipped. This
/// lenient-skip policy is deliberate: rows written by other writers of the
/// same table (tool output, system notes) are not part of the dialogue being
/// summarized.
pub fn render_transcript(turns: &[Turn]) -> String {
    let mut lines = Vec::new();
    for turn in turns {
        match &turn.role {
            Role::User => lines.push(format!("User: {}", turn.text)),
            Role::Assistant => lines.push(format!("Assistant: {}", turn.text)),
            Role::Other(_) => {}
        }
    }
    lines.join("\n")
}

/// Build the summarization prompt for a rendered transcript.
///
/// The shape matters for stable summary quality: task framing, what to
/// extract, a bullet-count target, what to preserve verbatim, then the full
/// transcript after a delimiter.
pub fn build_compaction_prompt(transcript: &str) -> String {
    format!(
        "You are compressing a long chat into a concise memory for future turns.\n\
         Extract key facts, user preferences, constraints, names, and unresolved questions.\n\
         Return 8-14 bullet points. Be specific; keep numbers, URLs, and decisions.\n\n\
         Conversation:\n{transcript}"
    )
}

/// Memory compactor.
///
/// Decides whether a conversation has grown past its character limit and, if
/// so, replaces it with one synthesized memory note plus the most recent
/// turns kept verbatim. The summarization call happens strictly before any
/// mutation: if it fails or times out, the stored conversation is untouched.
///
/// # Example
///
/// ```rust,ignore
/// use hearth_core::compactor::{CompactorConfig, MemoryCompactor};
///
/// let compactor = MemoryCompactor::new(
///     CompactorConfig::new().with_limit_chars(8000).with_keep_last(8),
/// );
///
/// let outcome = compactor
///     .compact("session-1", &store, &client, &events)
///     .await?;
/// ```
pub struct MemoryCompactor {
    config: CompactorConfig,
}

impl MemoryCompactor {
    /// Create a new compactor.
    pub fn new(config: CompactorConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &CompactorConfig {
        &self.config
    }

    /// Run one compaction pass over a session.
    ///
    /// Returns `Ok(NoOp)` when the conversation is at or below the limit,
    /// `Ok(Failed)` when the completion client errors or exceeds the request
    /// deadline (conversation untouched), and `Err` only for store failures.
    /// The replacing write is atomic; a concurrent reader of the session sees
    /// either the old conversation or the rewritten one.
    pub async fn compact(
        &self,
        session_id: &str,
        store: &dyn ConversationStore,
        client: &dyn CompletionClient,
        events: &dyn EventSink,
    ) -> Result<CompactionOutcome> {
        let turns = store.read(session_id).await?;

        let pre_chars = total_chars(&turns);
        if pre_chars <= self.config.limit_chars {
            tracing::debug!(
                session_id,
                pre_chars,
                limit_chars = self.config.limit_chars,
                "conversation under limit, skipping compaction"
            );
            return Ok(CompactionOutcome::NoOp);
        }

        let transcript = render_transcript(&turns);
        let prompt = build_compaction_prompt(&transcript);

        let summary =
            match timeout(self.config.request_timeout, client.complete_text(&prompt)).await {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    let error = e.to_string();
                    record_best_effort(
                        events,
                        session_id,
                        "memory_summary_error",
                        serde_json::json!({ "error": error }),
                    )
                    .await;
                    return Ok(CompactionOutcome::Failed { error });
                }
                Err(_) => {
                    let error = format!(
                        "summarization timed out after {:?}",
                        self.config.request_timeout
                    );
                    record_best_effort(
                        events,
                        session_id,
                        "memory_summary_error",
                        serde_json::json!({ "error": error }),
                    )
                    .await;
                    return Ok(CompactionOutcome::Failed { error });
                }
            };

        let tail_start = turns.len().saturating_sub(self.config.keep_last);
        let tail = &turns[tail_start..];

        let mut rewritten = Vec::with_capacity(tail.len() + 1);
        rewritten.push(Turn::assistant(format!("{MEMORY_NOTE_MARKER}\n{summary}")));
        for turn in tail {
            match &turn.role {
                // Same lenient-skip as transcript rendering
                Role::User | Role::Assistant => rewritten.push(turn.clone()),
                Role::Other(_) => {}
            }
        }

        let report = CompactionReport {
            pre_chars,
            post_chars: total_chars(&rewritten),
            kept_messages: tail.len(),
            summary_chars: summary.chars().count(),
        };

        store.replace_all(session_id, rewritten).await?;

        tracing::info!(
            session_id,
            pre_chars = report.pre_chars,
            post_chars = report.post_chars,
            kept_messages = report.kept_messages,
            "conversation compacted into memory note"
        );

        record_best_effort(
            events,
            session_id,
            "memory_summarized",
            serde_json::json!({
                "pre_chars": report.pre_chars,
                "post_chars": report.post_chars,
                "kept_messages": report.kept_messages,
                "summary_chars": report.summary_chars,
            }),
        )
        .await;

        Ok(CompactionOutcome::Compacted(report))
    }
}
