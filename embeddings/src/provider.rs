//! Embedding providers.
//!
//! The knowledge base talks to embedding engines through the
//! [`EmbeddingProvider`] trait. The bundled [`OpenAIProvider`] speaks the
//! OpenAI `/embeddings` wire format, which most hosted and self-hosted
//! engines also expose.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Which side of a retrieval comparison a text belongs to.
///
/// Some models embed queries and documents differently; providers that do
/// not distinguish the two simply ignore this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// A user question.
    Query,
    /// A stored document chunk.
    #[default]
    Document,
}

/// Request for generating embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Text to embed.
    pub text: String,

    /// Whether the text is a query or a document.
    pub kind: InputKind,

    /// Dimensions for the output (if supported by provider).
    pub dimensions: Option<usize>,
}

impl EmbeddingRequest {
    /// Create a document-side embedding request.
    pub fn document(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: InputKind::Document,
            dimensions: None,
        }
    }

    /// Create a query-side embedding request.
    pub fn query(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: InputKind::Query,
            dimensions: None,
        }
    }

    /// Set the output dimensions.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

/// Response from embedding generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The generated embedding.
    pub embedding: Embedding,

    /// Model that produced the embedding.
    pub model: String,

    /// Dimension of the embedding.
    pub dimension: usize,

    /// Token usage (if available).
    pub tokens_used: Option<u64>,
}

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Identifier of the model every vector from this provider comes from.
    fn model_id(&self) -> &str;

    /// Get the expected embedding dimension.
    fn dimension(&self) -> usize;

    /// Generate an embedding for the given text.
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse>;

    /// Generate embeddings for multiple texts, preserving input order.
    async fn embed_batch(&self, requests: Vec<EmbeddingRequest>) -> Result<Vec<EmbeddingResponse>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.embed(request).await?);
        }
        Ok(results)
    }

    /// Check if the provider is usable (API key set, etc.).
    fn is_available(&self) -> bool;
}

/// OpenAI-compatible embedding provider.
pub struct OpenAIProvider {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Model sent with every request.
    model: String,

    /// Most inputs sent in one `/embeddings` request.
    batch_size: usize,
}

/// Inputs per request; well inside the limits OpenAI-compatible APIs impose.
const DEFAULT_BATCH_SIZE: usize = 256;

impl OpenAIProvider {
    /// Create a new provider reading `OPENAI_API_KEY` from the environment.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            model: "text-embedding-3-small".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set how many inputs go into one request (at least one).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Embed one request's worth of inputs, in input order.
    async fn embed_slice(&self, requests: &[EmbeddingRequest]) -> Result<Vec<EmbeddingResponse>> {
        let dimensions = requests.first().and_then(|r| r.dimensions);
        let texts: Vec<&str> = requests.iter().map(|r| r.text.as_str()).collect();

        let mut result = self.post(serde_json::json!(texts), dimensions).await?;
        if result.data.len() != requests.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                requests.len(),
                result.data.len()
            )));
        }

        // The API may return items out of order; `index` is authoritative.
        result.data.sort_by_key(|item| item.index);

        let model = result.model;
        Ok(result
            .data
            .into_iter()
            .map(|item| EmbeddingResponse {
                dimension: item.embedding.len(),
                embedding: item.embedding,
                model: model.clone(),
                tokens_used: None,
            })
            .collect())
    }

    async fn post(&self, input: serde_json::Value, dimensions: Option<usize>) -> Result<OpenAIEmbeddingResponse> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(EmbeddingError::ProviderNotConfigured)?;

        let mut body = serde_json::json!({
            "input": input,
            "model": self.model,
        });
        if let Some(dims) = dimensions {
            body["dimensions"] = serde_json::json!(dims);
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!("{status}: {error_text}")));
        }

        Ok(response.json().await?)
    }
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-3-large" => 3072,
            "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => 384,
            "all-mpnet-base-v2" | "sentence-transformers/all-mpnet-base-v2" => 768,
            _ => 1536,
        }
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        debug!("Generating {:?} embedding with model: {}", request.kind, self.model);

        let result = self
            .post(serde_json::json!(request.text), request.dimensions)
            .await?;

        let tokens_used = result.usage.as_ref().map(|u| u.total_tokens);
        let embedding = result
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding in response".to_string()))?
            .embedding;

        Ok(EmbeddingResponse {
            dimension: embedding.len(),
            embedding,
            model: result.model,
            tokens_used,
        })
    }

    async fn embed_batch(&self, requests: Vec<EmbeddingRequest>) -> Result<Vec<EmbeddingResponse>> {
        debug!(
            "Generating batch embeddings for {} texts with model: {} ({} per request)",
            requests.len(),
            self.model,
            self.batch_size
        );

        let mut responses = Vec::with_capacity(requests.len());
        for slice in requests.chunks(self.batch_size) {
            responses.extend(self.embed_slice(slice).await?);
        }
        Ok(responses)
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
    model: String,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    total_tokens: u64,
}
