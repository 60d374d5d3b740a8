//! Ollama completion client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncBufReadExt;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;

use crate::error::{HearthError, Result};
use crate::llm::{
    CompletionClient, CompletionRequest, CompletionResponse, CompletionStream, MessageRole,
    ModelInfo, TokenUsage,
};

/// Completion client backed by a local Ollama server.
///
/// Carries default sampling parameters (temperature, top_p, seed) bound at
/// construction; per-request values take precedence.
pub struct OllamaClient {
    client: reqwest::Client,
    model: String,
    base_url: String,
    temperature: Option<f32>,
    top_p: Option<f32>,
    seed: Option<i64>,
}

impl OllamaClient {
    /// Create a new Ollama client.
    ///
    /// # Arguments
    ///
    /// * `model` - Model name (e.g., "llama3:8b")
    /// * `base_url` - Base URL for the Ollama API (defaults to "http://localhost:11434")
    pub fn new(model: impl Into<String>, base_url: Option<impl Into<String>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            model: model.into(),
            base_url: base_url
                .map(|u| u.into())
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            temperature: None,
            top_p: None,
            seed: None,
        }
    }

    /// Create from environment variables.
    ///
    /// Reads from:
    /// - `OLLAMA_MODEL` - Model name (optional, defaults to "llama3:8b")
    /// - `OLLAMA_BASE_URL` - Base URL (optional, defaults to "http://localhost:11434")
    ///
    /// # Arguments
    ///
    /// * `model` - Model name (overrides OLLAMA_MODEL if provided)
    pub fn from_env(model: Option<impl Into<String>>) -> Result<Self> {
        let model = model
            .map(|m| m.into())
            .or_else(|| std::env::var("OLLAMA_MODEL").ok())
            .unwrap_or_else(|| "llama3:8b".to_string());

        let base_url = std::env::var("OLLAMA_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:11434".to_string());

        Ok(Self::new(model, Some(base_url)))
    }

    /// Create with default settings (llama3:8b, localhost:11434).
    pub fn with_defaults() -> Result<Self> {
        Self::from_env(None::<String>)
    }

    /// Set the default temperature (clamped to 0.0-2.0).
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    /// Set the default nucleus sampling cutoff (clamped to 0.0-1.0).
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p.clamp(0.0, 1.0));
        self
    }

    /// Set the default sampling seed.
    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> OllamaRequest {
        let messages: Vec<OllamaMessage> = request
            .messages
            .iter()
            .map(|m| OllamaMessage {
                role: match m.role {
                    MessageRole::System => "system".to_string(),
                    MessageRole::User => "user".to_string(),
                    MessageRole::Assistant => "assistant".to_string(),
                },
                content: m.content.clone(),
            })
            .collect();

        let options = OllamaOptions {
            temperature: request.temperature.or(self.temperature),
            top_p: request.top_p.or(self.top_p),
            seed: request.seed.or(self.seed),
            num_predict: request.max_tokens,
        };

        OllamaRequest {
            model: self.model.clone(),
            messages,
            stream,
            options: Some(options),
        }
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: Option<f32>,
    top_p: Option<f32>,
    seed: Option<i64>,
    num_predict: Option<usize>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessageResponse,
    #[serde(default)]
    prompt_eval_count: Option<usize>,
    #[serde(default)]
    eval_count: Option<usize>,
}

#[derive(Deserialize)]
struct OllamaMessageResponse {
    content: String,
}

#[derive(Deserialize)]
struct OllamaStreamChunk {
    #[serde(default)]
    message: Option<OllamaStreamMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Deserialize)]
struct OllamaStreamMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let ollama_request = self.build_request(request, false);
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| {
                HearthError::Completion(format!(
                    "Failed to send request to Ollama: {}. Make sure Ollama is running.",
                    e
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(HearthError::Completion(format!(
                "Ollama API error ({}): {}",
                status, text
            )));
        }

        let response_text = response.text().await.map_err(|e| {
            HearthError::Completion(format!("Failed to read Ollama response: {}", e))
        })?;

        let ollama_response: OllamaResponse = serde_json::from_str(&response_text).map_err(|e| {
            HearthError::Completion(format!("Failed to parse Ollama response: {}", e))
        })?;

        let usage = if let (Some(prompt_tokens), Some(completion_tokens)) = (
            ollama_response.prompt_eval_count,
            ollama_response.eval_count,
        ) {
            Some(TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            })
        } else {
            None
        };

        Ok(CompletionResponse {
            content: ollama_response.message.content.trim().to_string(),
            usage,
        })
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<CompletionStream> {
        let ollama_request = self.build_request(request, true);
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| {
                HearthError::Completion(format!(
                    "Failed to send request to Ollama: {}. Make sure Ollama is running.",
                    e
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(HearthError::Completion(format!(
                "Ollama API error ({}): {}",
                status, text
            )));
        }

        // Convert response bytes to a stream of NDJSON lines
        let bytes_stream = response.bytes_stream();
        let reader = tokio_util::io::StreamReader::new(
            bytes_stream.map(|r| r.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))),
        );
        let lines = tokio::io::BufReader::new(reader).lines();
        let lines_stream = LinesStream::new(lines);

        let stream = lines_stream.filter_map(|line_result| match line_result {
            Ok(line) => {
                if line.trim().is_empty() {
                    return None;
                }

                match serde_json::from_str::<OllamaStreamChunk>(&line) {
                    Ok(chunk) => {
                        if chunk.done {
                            return None;
                        }
                        match chunk.message {
                            Some(message) if !message.content.is_empty() => {
                                Some(Ok(message.content))
                            }
                            _ => None,
                        }
                    }
                    Err(e) => Some(Err(HearthError::Completion(format!(
                        "Failed to parse stream chunk: {}",
                        e
                    )))),
                }
            }
            Err(e) => Some(Err(HearthError::Completion(format!(
                "Stream read error: {}",
                e
            )))),
        });

        Ok(Box::pin(stream))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "ollama".to_string(),
            model_name: self.model.clone(),
        }
    }
}
