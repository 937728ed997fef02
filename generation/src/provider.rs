//! Generation provider trait and request types.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Stream of generated text fragments.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a chat prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A prompt plus sampling limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Prompt messages, in order.
    pub messages: Vec<ChatMessage>,

    /// Upper bound on generated tokens.
    pub max_tokens: u32,

    /// Sampling temperature; `None` uses the provider default.
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    /// Create a request with the default 1024-token budget.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            max_tokens: 1024,
            temperature: None,
        }
    }

    /// Set the token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Trait for text-generation providers.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Model that answers requests.
    fn model_id(&self) -> &str;

    /// Start generating; fragments arrive on the returned stream.
    async fn generate(&self, request: GenerationRequest) -> Result<TextStream>;

    /// Check if the provider is usable (API key set, etc.).
    fn is_available(&self) -> bool;
}

/// Concatenate every fragment of a stream.
pub async fn collect_text(mut stream: TextStream) -> Result<String> {
    let mut text = String::new();
    while let Some(fragment) = stream.next().await {
        text.push_str(&fragment?);
    }
    Ok(text)
}

/// Run a request to completion and return the full text.
pub async fn complete(provider: &dyn GenerationProvider, request: GenerationRequest) -> Result<String> {
    let stream = provider.generate(request).await?;
    collect_text(stream).await
}

/// Which model produced an answer, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub model_used: String,
    pub timestamp: String,
}

impl Provenance {
    /// Stamp `model` with the current UTC time.
    pub fn now(model: impl Into<String>) -> Self {
        Self {
            model_used: model.into(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_collect_text_concatenates_fragments() {
        let stream: TextStream = Box::pin(futures::stream::iter(vec![
            Ok("Electronic ".to_string()),
            Ok("devices".to_string()),
        ]));

        assert_eq!(collect_text(stream).await.unwrap(), "Electronic devices");
    }

    #[tokio::test]
    async fn test_collect_text_stops_on_error() {
        let stream: TextStream = Box::pin(futures::stream::iter(vec![
            Ok("partial".to_string()),
            Err(GenerationError::Stream("reset".to_string())),
        ]));

        assert!(collect_text(stream).await.is_err());
    }

    #[test]
    fn test_provenance_timestamp_is_utc() {
        let provenance = Provenance::now("llama-3.3-70b-versatile");
        assert_eq!(provenance.model_used, "llama-3.3-70b-versatile");
        assert!(provenance.timestamp.ends_with('Z'));
    }
}
