use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::{HearthError, Result};

/// Message role in a model conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A message in a model conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Request to a completion backend
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Messages in the conversation
    pub messages: Vec<Message>,

    /// Temperature for generation (0.0-2.0); `None` uses the client default
    pub temperature: Option<f32>,

    /// Nucleus sampling cutoff (0.0-1.0); `None` uses the client default
    pub top_p: Option<f32>,

    /// Sampling seed; `None` uses the client default
    pub seed: Option<i64>,

    /// Maximum tokens to generate
    pub max_tokens: Option<usize>,
}

impl CompletionRequest {
    /// Create a simple request from a single prompt
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self::from_messages(vec![Message {
            role: MessageRole::User,
            content: prompt.into(),
        }])
    }

    /// Create a request from an assembled message list
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            temperature: None,
            top_p: None,
            seed: None,
            max_tokens: None,
        }
    }

    /// Create a request with a system prompt ahead of the user prompt
    pub fn with_system_prompt(
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self::from_messages(vec![
            Message {
                role: MessageRole::System,
                content: system_prompt.into(),
            },
            Message {
                role: MessageRole::User,
                content: user_prompt.into(),
            },
        ])
    }
}

/// Response from a completion backend
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,

    /// Token usage information, when the backend reports it
    pub usage: Option<TokenUsage>,
}

/// Token usage information
#[derive(Debug, Clone)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Stream of generated text chunks
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub provider: String,
    pub model_name: String,
}

/// Trait for completion backends.
///
/// Two invocation modes: single-shot (`complete`, full text in / full text
/// out, used by the memory compactor) and streaming (`complete_stream`,
/// chunk by chunk, used by the chat loop).
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Single-shot completion: the call returns once the full response is
    /// available.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;

    /// Streaming completion (optional).
    ///
    /// Clients that cannot stream return an error; callers may fall back to
    /// `complete`.
    async fn complete_stream(&self, _request: &CompletionRequest) -> Result<CompletionStream> {
        Err(HearthError::Completion(
            "streaming not supported by this client".to_string(),
        ))
    }

    /// Convenience wrapper: single prompt in, full text out.
    async fn complete_text(&self, prompt: &str) -> Result<String> {
        let request = CompletionRequest::from_prompt(prompt);
        let response = self.complete(&request).await?;
        Ok(response.content)
    }

    /// Get model information
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "unknown".to_string(),
            model_name: "unknown".to_string(),
        }
    }
}

/// Stub completion client (returns an error on every call).
///
/// Allows wiring the chat engine without a model backend; any attempt to
/// generate reports a configuration problem.
pub struct StubCompletionClient;

#[async_trait]
impl CompletionClient for StubCompletionClient {
    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
        Err(HearthError::Completion(
            "completion client not configured".to_string(),
        ))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "stub".to_string(),
            model_name: "none".to_string(),
        }
    }
}

pub mod ollama;

pub use ollama::OllamaClient;

/// Build the default client from model configuration.
///
/// Binds the configured sampling parameters into the client, so every request
/// issued through it inherits them unless overridden per request.
pub fn client_from_config(config: &crate::config::ModelConfig) -> OllamaClient {
    OllamaClient::new(config.model.clone(), config.base_url.clone())
        .with_temperature(config.temperature)
        .with_top_p(config.top_p)
        .with_seed(config.seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_prompt() {
        let request = CompletionRequest::from_prompt("hello");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, MessageRole::User);
        assert!(request.temperature.is_none());
    }

    #[test]
    fn test_request_with_system_prompt() {
        let request = CompletionRequest::with_system_prompt("be brief", "hello");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, MessageRole::System);
        assert_eq!(request.messages[1].role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_stub_client_errors() {
        let client = StubCompletionClient;
        assert!(client.complete_text("test").await.is_err());
        assert!(client
            .complete_stream(&CompletionRequest::from_prompt("test"))
            .await
            .is_err());
    }
}
