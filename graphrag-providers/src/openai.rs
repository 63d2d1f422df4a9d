// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! OpenAI-compatible chat and embedding client
//!
//! Rate limits (429), server errors (5xx) and transport failures are retried
//! with the configured [`RetryPolicy`]; every other failure is returned on the
//! first attempt.

use async_trait::async_trait;
use graphrag_core::{
    CallContext, CompletionOptions, EmbedError, Embedder, LanguageModel, LlmError, RetryError,
    RetryPolicy,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout, on top of any call deadline
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_base_url(),
            timeout: default_timeout(),
            retry: RetryPolicy::default(),
        }
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Chat completions and embeddings over one HTTP client.
///
/// `model` answers completion calls, `embedding_model` embedding calls.
#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    model: String,
    embedding_model: String,
    client: reqwest::Client,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("config", &self.config)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

/// Why one HTTP attempt failed
#[derive(Debug)]
enum CallFailure {
    Transport(String),
    Status { status: u16, body: String },
    Decode(String),
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallFailure::Transport(msg) => write!(f, "transport error: {}", msg),
            CallFailure::Status { status, body } => write!(f, "HTTP {}: {}", status, body),
            CallFailure::Decode(msg) => write!(f, "undecodable response: {}", msg),
        }
    }
}

impl CallFailure {
    fn is_transient(&self) -> bool {
        match self {
            CallFailure::Transport(_) => true,
            CallFailure::Status { status, .. } => *status == 429 || *status >= 500,
            CallFailure::Decode(_) => false,
        }
    }
}

fn llm_error(err: RetryError<CallFailure>) -> LlmError {
    match err {
        RetryError::Cancelled(reason) => LlmError::Http(format!("request abandoned: {}", reason)),
        RetryError::Inner(CallFailure::Transport(msg)) => LlmError::Http(msg),
        RetryError::Inner(CallFailure::Status { status: 429, .. }) => LlmError::RateLimitExceeded,
        RetryError::Inner(failure @ CallFailure::Status { .. }) => LlmError::ApiError(failure.to_string()),
        RetryError::Inner(CallFailure::Decode(msg)) => LlmError::InvalidResponse(msg),
    }
}

fn embed_error(err: RetryError<CallFailure>) -> EmbedError {
    match err {
        RetryError::Cancelled(reason) => EmbedError::Http(format!("request abandoned: {}", reason)),
        RetryError::Inner(CallFailure::Transport(msg)) => EmbedError::Http(msg),
        RetryError::Inner(CallFailure::Status { status: 429, .. }) => EmbedError::RateLimitExceeded,
        RetryError::Inner(failure @ CallFailure::Status { .. }) => EmbedError::ApiError(failure.to_string()),
        RetryError::Inner(CallFailure::Decode(msg)) => EmbedError::InvalidResponse(msg),
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig, model: impl Into<String>) -> Self {
        Self {
            config,
            model: model.into(),
            embedding_model: "text-embedding-ada-002".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Same connection, different completion model
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    async fn post<B, T>(&self, path: &str, body: &B, ctx: &CallContext) -> Result<T, RetryError<CallFailure>>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let url = url.as_str();
        self.config
            .retry
            .run(ctx, CallFailure::is_transient, move || async move {
                let timeout = match ctx.remaining() {
                    Some(left) => left.min(self.config.timeout),
                    None => self.config.timeout,
                };
                let response = self
                    .client
                    .post(url)
                    .bearer_auth(&self.config.api_key)
                    .timeout(timeout)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| CallFailure::Transport(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(CallFailure::Status {
                        status: status.as_u16(),
                        body,
                    });
                }
                response
                    .json::<T>()
                    .await
                    .map_err(|e| CallFailure::Decode(e.to_string()))
            })
            .await
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
        ctx: &CallContext,
    ) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = options.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: options.temperature,
            seed: options.seed,
            max_tokens: options.max_tokens,
        };

        let response: ChatResponse = self
            .post("chat/completions", &request, ctx)
            .await
            .map_err(llm_error)?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("Missing content".to_string()))?;
        debug!(model = %self.model, chars = content.len(), "Chat completion received");
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str, ctx: &CallContext) -> Result<Vec<f32>, EmbedError> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
        };
        let response: EmbeddingResponse = self
            .post("embeddings", &request, ctx)
            .await
            .map_err(embed_error)?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbedError::InvalidResponse("No embedding returned".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}
