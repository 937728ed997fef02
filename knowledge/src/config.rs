//! Configuration for the knowledge base.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{KnowledgeError, Result};

/// Tunables for building and querying the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Directory holding the persisted snapshot.
    pub index_dir: PathBuf,

    /// Maximum tokens per chunk.
    pub max_tokens: usize,

    /// Words carried from one chunk into the next.
    pub overlap: usize,

    /// Number of chunks handed to the answerer.
    pub top_k: usize,

    /// Minimum cosine similarity between query and top chunk.
    pub relevance_threshold: f32,

    /// Token budget of the grounded answer.
    pub answer_max_tokens: u32,

    /// Sampling temperature of the grounded answer.
    pub answer_temperature: f32,
}

impl KnowledgeConfig {
    /// Create a configuration storing its snapshot under `index_dir`.
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            max_tokens: 512,
            overlap: 50,
            top_k: 3,
            relevance_threshold: 0.3,
            answer_max_tokens: 1024,
            answer_temperature: 0.2,
        }
    }

    /// Set the relevance threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.relevance_threshold = threshold;
        self
    }

    /// Set chunk size and overlap.
    pub fn with_chunking(mut self, max_tokens: usize, overlap: usize) -> Self {
        self.max_tokens = max_tokens;
        self.overlap = overlap;
        self
    }

    /// Reject values that would make retrieval meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(KnowledgeError::Config("max_tokens must be positive".to_string()));
        }
        if self.top_k == 0 {
            return Err(KnowledgeError::Config("top_k must be positive".to_string()));
        }
        if !(-1.0..=1.0).contains(&self.relevance_threshold) {
            return Err(KnowledgeError::Config(format!(
                "relevance_threshold must lie in [-1, 1], got {}",
                self.relevance_threshold
            )));
        }
        Ok(())
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self::new(dirs::data_dir().unwrap_or_default().join("kbqa/index"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = KnowledgeConfig::new("/tmp/kbqa");
        assert!(config.validate().is_ok());
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.overlap, 50);
        assert_eq!(config.top_k, 3);
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let config = KnowledgeConfig::new("/tmp/kbqa").with_threshold(1.5);
        assert!(matches!(config.validate(), Err(KnowledgeError::Config(_))));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: KnowledgeConfig =
            serde_json::from_str(r#"{"relevance_threshold": 0.5}"#).unwrap();
        assert_eq!(config.relevance_threshold, 0.5);
        assert_eq!(config.top_k, 3);
    }
}
