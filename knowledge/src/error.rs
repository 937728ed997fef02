//! Error types for the knowledge base.

use thiserror::Error;

use crate::extraction::ExtractionError;

/// Result type alias for knowledge-base operations.
pub type Result<T> = std::result::Result<T, KnowledgeError>;

/// Errors that can occur while building or querying the knowledge base.
#[derive(Error, Debug)]
pub enum KnowledgeError {
    /// The source document could not be turned into text.
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// The source produced no text to index.
    #[error("source contains no indexable text")]
    EmptySource,

    /// Embedding provider error.
    #[error("embedding error: {0}")]
    Embedding(#[from] kbqa_embeddings::EmbeddingError),

    /// Generation provider error.
    #[error("generation error: {0}")]
    Generation(#[from] kbqa_generation::GenerationError),

    /// Persisted snapshot is unreadable or inconsistent.
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// Tokenizer could not be loaded.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A background task panicked or was aborted.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
