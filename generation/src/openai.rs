//! OpenAI-compatible streaming chat completions.
//!
//! Works against any endpoint that speaks the `/chat/completions` SSE
//! protocol (OpenAI, Groq, vLLM, Ollama's compatibility layer, ...).

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use futures::future::ready;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GenerationError, Result};
use crate::provider::{ChatMessage, GenerationProvider, GenerationRequest, TextStream};

const DONE_SENTINEL: &str = "[DONE]";

/// Streaming chat provider for OpenAI-compatible APIs.
pub struct OpenAIChatProvider {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Model sent with every request.
    model: String,

    /// Temperature used when a request does not set one.
    default_temperature: f32,
}

impl OpenAIChatProvider {
    /// Create a provider for `base_url` serving `model`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            model: model.into(),
            default_temperature: 0.5,
        }
    }

    /// Groq's OpenAI-compatible endpoint, keyed by `GROQ_API_KEY`.
    pub fn groq() -> Self {
        let provider = Self::new("https://api.groq.com/openai/v1", "llama-3.3-70b-versatile");
        match std::env::var("GROQ_API_KEY") {
            Ok(key) => provider.with_api_key(key),
            Err(_) => provider,
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the temperature used when a request leaves it unset.
    pub fn with_default_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = temperature;
        self
    }
}

#[async_trait]
impl GenerationProvider for OpenAIChatProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: GenerationRequest) -> Result<TextStream> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(GenerationError::ProviderNotConfigured)?;

        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature.unwrap_or(self.default_temperature),
            max_tokens: request.max_tokens,
            top_p: 1.0,
            stream: true,
        };

        debug!(
            "Requesting completion from {} ({} messages, max {} tokens)",
            self.model,
            request.messages.len(),
            request.max_tokens
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(GenerationError::ApiRequest { status, body });
        }

        let stream = response
            .bytes_stream()
            .eventsource()
            .take_while(|event| {
                ready(!matches!(event, Ok(event) if event.data.trim() == DONE_SENTINEL))
            })
            .filter_map(|event| {
                ready(match event {
                    Ok(event) => parse_delta(&event.data).transpose(),
                    Err(err) => Some(Err(GenerationError::Stream(err.to_string()))),
                })
            });

        Ok(Box::pin(stream))
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Extract the text fragment of one streamed chunk, if any.
fn parse_delta(data: &str) -> Result<Option<String>> {
    let chunk: ChatChunk = serde_json::from_str(data)
        .map_err(|e| GenerationError::InvalidResponse(format!("{e}: {data}")))?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}
