//! Chat turn loop
//!
//! Wires the conversation store, completion client, audit log, and memory
//! compactor into the per-session request path: persist the user turn, run
//! the model over the accumulated history, persist the reply, then give the
//! compactor a chance to shrink the conversation.
//!
//! All collaborators are supplied by the caller; the engine holds no global
//! state and sessions are independent of each other.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use uuid::Uuid;

use crate::compactor::{CompactionOutcome, MemoryCompactor};
use crate::error::Result;
use crate::events::{record_best_effort, EventSink};
use crate::llm::{CompletionClient, CompletionRequest, Message, MessageRole};
use crate::store::{ConversationStore, Role, Turn};

/// Generate a fresh session identifier.
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Outcome of one chat exchange.
#[derive(Debug)]
pub struct ChatReply {
    /// Full assistant text (possibly partial if the stream broke, empty if
    /// the model produced nothing).
    pub text: String,

    /// Wall-clock time spent on the model call.
    pub latency: Duration,

    /// Model-side failure, if any. Whatever text arrived before the failure
    /// is still in `text` and has been persisted.
    pub error: Option<String>,

    /// Result of the post-reply compaction pass, when a compactor is
    /// configured.
    pub compaction: Option<CompactionOutcome>,
}

/// Per-session chat engine.
pub struct ChatEngine {
    store: Arc<dyn ConversationStore>,
    client: Arc<dyn CompletionClient>,
    events: Arc<dyn EventSink>,
    compactor: Option<MemoryCompactor>,
    system_prompt: Option<String>,
}

impl ChatEngine {
    /// Create an engine over the given collaborators.
    pub fn new(
        store: Arc<dyn ConversationStore>,
        client: Arc<dyn CompletionClient>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            client,
            events,
            compactor: None,
            system_prompt: None,
        }
    }

    /// Set the system prompt prepended to every model call.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Enable automatic memory compaction after each exchange.
    pub fn with_compactor(mut self, compactor: MemoryCompactor) -> Self {
        self.compactor = Some(compactor);
        self
    }

    /// The stored conversation for a session.
    pub async fn history(&self, session_id: &str) -> Result<Vec<Turn>> {
        self.store.read(session_id).await
    }

    /// Delete the session's conversation.
    pub async fn clear(&self, session_id: &str) -> Result<()> {
        self.store.clear(session_id).await?;
        record_best_effort(
            self.events.as_ref(),
            session_id,
            "chat_cleared",
            serde_json::json!({}),
        )
        .await;
        Ok(())
    }

    /// Assemble the runtime message list: system prompt first, then the
    /// stored history. Turns with unrecognized roles are skipped, matching
    /// the transcript-rendering policy.
    fn runtime_messages(&self, turns: &[Turn]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        if let Some(ref system) = self.system_prompt {
            messages.push(Message {
                role: MessageRole::System,
                content: system.clone(),
            });
        }
        for turn in turns {
            let role = match &turn.role {
                Role::User => MessageRole::User,
                Role::Assistant => MessageRole::Assistant,
                Role::Other(_) => continue,
            };
            messages.push(Message {
                role,
                content: turn.text.clone(),
            });
        }
        messages
    }

    /// Send a user message and stream the reply, invoking `on_chunk` for each
    /// text fragment as it arrives.
    ///
    /// A model failure does not fail the call: the partial text (if any) is
    /// persisted, the failure is recorded in the audit log and reported in
    /// [`ChatReply::error`]. Only store failures return `Err`.
    pub async fn send_streaming<F>(
        &self,
        session_id: &str,
        user_input: &str,
        mut on_chunk: F,
    ) -> Result<ChatReply>
    where
        F: FnMut(&str) + Send,
    {
        let request = self.begin_turn(session_id, user_input).await?;

        let started = Instant::now();
        let mut full_text = String::new();
        let mut error = None;

        match self.client.complete_stream(&request).await {
            Ok(mut stream) => {
                while let Some(chunk) = stream.next().await {
                    match chunk {
                        Ok(text) => {
                            full_text.push_str(&text);
                            on_chunk(&text);
                        }
                        Err(e) => {
                            error = Some(e.to_string());
                            break;
                        }
                    }
                }
            }
            Err(e) => error = Some(e.to_string()),
        }

        self.finish_turn(session_id, full_text, started.elapsed(), error)
            .await
    }

    /// Send a user message and wait for the complete reply (single-shot mode).
    pub async fn send(&self, session_id: &str, user_input: &str) -> Result<ChatReply> {
        let request = self.begin_turn(session_id, user_input).await?;

        let started = Instant::now();
        let (full_text, error) = match self.client.complete(&request).await {
            Ok(response) => (response.content, None),
            Err(e) => (String::new(), Some(e.to_string())),
        };

        self.finish_turn(session_id, full_text, started.elapsed(), error)
            .await
    }

    /// Persist the user turn, record it, and build the model request from the
    /// accumulated history.
    async fn begin_turn(&self, session_id: &str, user_input: &str) -> Result<CompletionRequest> {
        self.store.append(session_id, Turn::user(user_input)).await?;
        record_best_effort(
            self.events.as_ref(),
            session_id,
            "user_message",
            serde_json::json!({
                "text": user_input,
                "model": self.client.model_info().model_name,
            }),
        )
        .await;

        let turns = self.store.read(session_id).await?;
        Ok(CompletionRequest::from_messages(
            self.runtime_messages(&turns),
        ))
    }

    /// Persist and record the assistant reply, then run the compactor.
    async fn finish_turn(
        &self,
        session_id: &str,
        full_text: String,
        latency: Duration,
        error: Option<String>,
    ) -> Result<ChatReply> {
        if let Some(ref e) = error {
            record_best_effort(
                self.events.as_ref(),
                session_id,
                "llm_error",
                serde_json::json!({ "error": e }),
            )
            .await;
        }

        if !full_text.is_empty() {
            self.store
                .append(session_id, Turn::assistant(full_text.clone()))
                .await?;
            let latency_sec = (latency.as_secs_f64() * 1000.0).round() / 1000.0;
            record_best_effort(
                self.events.as_ref(),
                session_id,
                "assistant_message",
                serde_json::json!({
                    "chars": full_text.chars().count(),
                    "latency_sec": latency_sec,
                }),
            )
            .await;
        }

        let compaction = match &self.compactor {
            Some(compactor) => Some(
                compactor
                    .compact(
                        session_id,
                        self.store.as_ref(),
                        self.client.as_ref(),
                        self.events.as_ref(),
                    )
                    .await?,
            ),
            None => None,
        };

        Ok(ChatReply {
            text: full_text,
            latency,
            error,
            compaction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compactor::{CompactorConfig, MEMORY_NOTE_MARKER};
    use crate::error::HearthError;
    use crate::events::InMemoryEventLog;
    use crate::llm::{CompletionResponse, CompletionStream, ModelInfo};
    use crate::store::InMemoryStore;
    use async_trait::async_trait;

    struct ScriptedClient {
        reply: String,
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
            Ok(CompletionResponse {
                content: self.reply.clone(),
                usage: None,
            })
        }

        async fn complete_stream(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionStream> {
            let chunks: Vec<Result<String>> = self
                .reply
                .split_inclusive(' ')
                .map(|s| Ok(s.to_string()))
                .collect();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }

        fn model_info(&self) -> ModelInfo {
            ModelInfo {
                provider: "scripted".to_string(),
                model_name: "scripted-1".to_string(),
            }
        }
    }

    struct FailingClient;

    #[async_trait]
    impl CompletionClient for FailingClient {
        async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
            Err(HearthError::Completion("connection refused".to_string()))
        }
    }

    fn engine_with(client: Arc<dyn CompletionClient>) -> (ChatEngine, Arc<InMemoryStore>, Arc<InMemoryEventLog>) {
        let store = Arc::new(InMemoryStore::new());
        let events = Arc::new(InMemoryEventLog::new());
        let engine = ChatEngine::new(store.clone(), client, events.clone())
            .with_system_prompt("You are helpful");
        (engine, store, events)
    }

    #[tokio::test]
    async fn test_send_persists_both_turns() {
        let (engine, store, events) = engine_with(Arc::new(ScriptedClient {
            reply: "hello back".to_string(),
        }));

        let reply = engine.send("s", "hello").await.unwrap();
        assert_eq!(reply.text, "hello back");
        assert!(reply.error.is_none());

        let turns = store.read("s").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0], Turn::user("hello"));
        assert_eq!(turns[1], Turn::assistant("hello back"));

        let names: Vec<String> = events.records().iter().map(|r| r.event.clone()).collect();
        assert_eq!(names, vec!["user_message", "assistant_message"]);
    }

    #[tokio::test]
    async fn test_send_streaming_accumulates_chunks() {
        let (engine, store, _events) = engine_with(Arc::new(ScriptedClient {
            reply: "one two three".to_string(),
        }));

        let mut seen = Vec::new();
        let reply = engine
            .send_streaming("s", "count", |chunk| seen.push(chunk.to_string()))
            .await
            .unwrap();

        assert!(seen.len() > 1);
        assert_eq!(seen.concat(), "one two three");
        assert_eq!(reply.text, "one two three");
        assert_eq!(store.read("s").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_model_failure_keeps_user_turn_and_logs() {
        let (engine, store, events) = engine_with(Arc::new(FailingClient));

        let reply = engine.send("s", "hello").await.unwrap();
        assert!(reply.text.is_empty());
        assert!(reply.error.is_some());

        // User turn persisted, no assistant turn.
        let turns = store.read("s").await.unwrap();
        assert_eq!(turns, vec![Turn::user("hello")]);

        assert!(events.records().iter().any(|r| r.event == "llm_error"));
    }

    #[tokio::test]
    async fn test_compaction_runs_after_reply() {
        let store = Arc::new(InMemoryStore::new());
        let events = Arc::new(InMemoryEventLog::new());
        let engine = ChatEngine::new(
            store.clone(),
            Arc::new(ScriptedClient {
                reply: "short summary".to_string(),
            }),
            events.clone(),
        )
        .with_compactor(MemoryCompactor::new(
            CompactorConfig::new().with_limit_chars(50).with_keep_last(2),
        ));

        // Long enough history that the next exchange crosses 50 chars.
        store
            .append("s", Turn::user("a".repeat(40)))
            .await
            .unwrap();
        store
            .append("s", Turn::assistant("b".repeat(40)))
            .await
            .unwrap();

        let reply = engine.send("s", "next question").await.unwrap();
        let compaction = reply.compaction.expect("compactor was configured");
        assert!(compaction.is_compacted());

        let turns = store.read("s").await.unwrap();
        assert_eq!(turns.len(), 3); // note + 2 kept turns
        assert!(turns[0].text.starts_with(MEMORY_NOTE_MARKER));
    }

    #[tokio::test]
    async fn test_clear_records_event() {
        let (engine, store, events) = engine_with(Arc::new(ScriptedClient {
            reply: "x".to_string(),
        }));

        store.append("s", Turn::user("hello")).await.unwrap();
        engine.clear("s").await.unwrap();

        assert!(store.read("s").await.unwrap().is_empty());
        assert!(events.records().iter().any(|r| r.event == "chat_cleared"));
    }

    #[tokio::test]
    async fn test_runtime_messages_skip_unknown_roles() {
        let (engine, _store, _events) = engine_with(Arc::new(ScriptedClient {
            reply: "x".to_string(),
        }));

        let turns = vec![
            Turn::user("q"),
            Turn::new(Role::from("tool"), "output"),
            Turn::assistant("a"),
        ];
        let messages = engine.runtime_messages(&turns);

        assert_eq!(messages.len(), 3); // system + user + assistant
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(messages[2].role, MessageRole::Assistant);
    }

    #[test]
    fn test_new_session_id_is_unique() {
        assert_ne!(new_session_id(), new_session_id());
    }
}
