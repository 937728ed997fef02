//! The record threaded through a pipeline run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open side channel any agent may write to.
pub type Meta = BTreeMap<String, Value>;

/// Where the response came from.
pub const META_SOURCE: &str = "source";
/// Relevance of the top chunk to the query.
pub const META_SIMILARITY: &str = "similarity";
pub const META_MODEL_USED: &str = "model_used";
pub const META_TIMESTAMP: &str = "timestamp";
/// Why retrieval degraded to the fallback.
pub const META_RETRIEVAL_ERROR: &str = "retrieval_error";
/// Why the primary generator failed.
pub const META_GENERATION_ERROR: &str = "generation_error";
/// Why the summary or subject could not be produced.
pub const META_SUMMARY_ERROR: &str = "summary_error";
/// Rebuild metadata written by the knowledge-base builder.
pub const META_KNOWLEDGE_BASE: &str = "knowledge_base";

/// `source` value of a grounded answer.
pub const SOURCE_VECTORSTORE: &str = "vectorstore";
/// `source` value when retrieval was absent or untrusted.
pub const SOURCE_MODEL_FALLBACK: &str = "model-fallback";

/// How an agent's turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Completed,
    Failed,
    /// Not run because a grounded answer was already present.
    Skipped,
}

/// One line of the run's audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub agent: String,
    pub status: AgentStatus,
}

/// State of one request, moved through each agent in turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineContext {
    pub query: String,
    pub response: Option<String>,
    pub summary: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub phone: Option<String>,
    pub to_email: Option<String>,
    pub url: Option<String>,
    pub email_status: Option<String>,
    pub sms_status: Option<String>,
    pub trace: Vec<TraceEntry>,
    pub meta: Meta,
}

impl PipelineContext {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_email(mut self, to_email: impl Into<String>) -> Self {
        self.to_email = Some(to_email.into());
        self
    }

    /// Append a trace entry for `agent`.
    pub fn record(&mut self, agent: impl Into<String>, status: AgentStatus) {
        self.trace.push(TraceEntry {
            agent: agent.into(),
            status,
        });
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.meta.insert(key.into(), value.into());
    }

    /// String value of a meta key, if present and a string.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(Value::as_str)
    }

    /// Value of `meta.source`.
    pub fn source(&self) -> Option<&str> {
        self.meta_str(META_SOURCE)
    }

    /// Whether the response is a grounded answer from the knowledge base.
    pub fn has_grounded_answer(&self) -> bool {
        self.response
            .as_deref()
            .is_some_and(|response| !response.trim().is_empty())
            && self.source() == Some(SOURCE_VECTORSTORE)
    }
}
