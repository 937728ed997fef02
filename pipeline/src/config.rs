//! Process-wide configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, an
//! optional TOML file, and environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use kbqa_knowledge::KnowledgeConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Configuration for every kbqa component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KbqaConfig {
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub knowledge: KnowledgeConfig,
    pub notification: NotificationConfig,
    pub pipeline: PipelineConfig,
}

impl KbqaConfig {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir().unwrap_or_default().join("kbqa/config.toml")
    }

    /// Load from `path` (or the default location if it exists), then apply
    /// the process environment and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Self::default_path();
                if default.is_file() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Override values from environment variables, read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let first = |keys: &[&str]| keys.iter().find_map(|key| lookup(key));

        if let Some(model) = first(&["MODEL_NAME"]) {
            self.generation.model = model;
        }
        if let Some(url) = first(&["GENERATION_BASE_URL"]) {
            self.generation.base_url = url;
        }
        if let Some(key) = first(&["GENERATION_API_KEY", "GROQ_API_KEY"]) {
            self.generation.api_key = Some(key);
        }
        if let Some(model) = first(&["EMBEDDING_MODEL"]) {
            self.embedding.model = model;
        }
        if let Some(url) = first(&["EMBEDDING_BASE_URL"]) {
            self.embedding.base_url = url;
        }
        if let Some(key) = first(&["EMBEDDING_API_KEY", "OPENAI_API_KEY"]) {
            self.embedding.api_key = Some(key);
        }
        if let Some(path) = first(&["KBQA_INDEX_PATH"]) {
            self.knowledge.index_dir = PathBuf::from(path);
        }
        if let Some(threshold) = first(&["RELEVANCE_THRESHOLD"]) {
            self.knowledge.relevance_threshold = threshold.trim().parse().map_err(|_| {
                PipelineError::Config(format!("RELEVANCE_THRESHOLD is not a number: {threshold}"))
            })?;
        }
        if let Some(dev_mode) = first(&["SMS_DEV_MODE"]) {
            self.notification.dev_mode = parse_flag(&dev_mode).ok_or_else(|| {
                PipelineError::Config(format!("SMS_DEV_MODE is not a boolean: {dev_mode}"))
            })?;
        }
        if let Some(secs) = first(&["KBQA_RUN_TIMEOUT_SECS"]) {
            self.pipeline.run_timeout_secs = Some(secs.trim().parse().map_err(|_| {
                PipelineError::Config(format!("KBQA_RUN_TIMEOUT_SECS is not a number: {secs}"))
            })?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.knowledge
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        if self.pipeline.run_timeout_secs == Some(0) {
            return Err(PipelineError::Config(
                "run_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
        }
    }
}

/// Primary generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "llama-3.3-70b-versatile".to_string(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key: None,
            temperature: 0.5,
            max_tokens: 1024,
        }
    }
}

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Log notifications instead of delivering them.
    pub dev_mode: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { dev_mode: true }
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on one whole run.
    pub run_timeout_secs: Option<u64>,
}

impl PipelineConfig {
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}
