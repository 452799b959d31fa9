//! Chat-completion and embedding client for OpenAI-compatible APIs.
//!
//! The [`CompletionClient`] trait is the narrow capability the rest of the
//! crate depends on (answer generation and concept extraction), so tests can
//! substitute a fake. [`OpenAiClient`] implements it against
//! `POST {base_url}/chat/completions` and additionally exposes
//! `POST {base_url}/embeddings` for the remote embedding tier.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::service::{http_client, read_json, send_with_retry, RetryPolicy, ServiceError};

/// A single chat-completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
}

/// Text-in, text-out language model capability.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ServiceError>;
}

/// Client for an OpenAI-compatible HTTP API.
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl OpenAiClient {
    /// Creates a client; `model` is the chat model used by [`CompletionClient`].
    pub fn new(
        base_url: &str,
        api_key: String,
        model: String,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            retry: RetryPolicy::new(max_retries),
        })
    }

    /// Embeds one text with the given embedding model.
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, ServiceError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = EmbeddingRequest { model, input: text };

        let response = send_with_retry(self.retry, || {
            self.client
                .post(&url)
                .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
                .header(CONTENT_TYPE, "application/json")
                .json(&body)
        })
        .await?;

        let parsed: EmbeddingResponse = read_json(response).await?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ServiceError::Malformed("embedding response has no data".to_string()))
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ServiceError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.user,
                },
            ],
        };

        let response = send_with_retry(self.retry, || {
            self.client
                .post(&url)
                .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
                .header(CONTENT_TYPE, "application/json")
                .json(&body)
        })
        .await?;

        let parsed: ChatResponse = read_json(response).await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| ServiceError::Malformed("completion has no message content".to_string()))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
