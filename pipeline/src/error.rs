//! Error types for pipeline runs.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that end a pipeline run.
///
/// Anything an agent can recover from is recorded in the context instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A requested agent name is not registered.
    #[error("Unknown agent '{0}'")]
    UnknownAgent(String),

    /// The generation provider is down or not configured.
    #[error("generation provider unavailable: {0}")]
    ProviderOutage(String),

    /// The whole run took longer than allowed.
    #[error("pipeline run exceeded {0:?}")]
    Timeout(Duration),

    /// Knowledge-base error outside of any agent.
    #[error("knowledge base error: {0}")]
    Knowledge(#[from] kbqa_knowledge::KnowledgeError),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file is not valid TOML.
    #[error("invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
