use std::sync::Arc;

use async_trait::async_trait;
use kbqa_knowledge::KnowledgeBaseManager;
use tracing::warn;

use crate::agent::{Agent, CREATE_KB};
use crate::context::{AgentStatus, META_KNOWLEDGE_BASE, PipelineContext};
use crate::error::Result;

pub const NO_URL_RESPONSE: &str = "No URL provided for knowledge base creation.";

/// Rebuilds the knowledge base from `url` and puts it live.
pub struct CreateKbAgent {
    manager: Arc<KnowledgeBaseManager>,
}

impl CreateKbAgent {
    pub fn new(manager: Arc<KnowledgeBaseManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Agent for CreateKbAgent {
    fn name(&self) -> &str {
        CREATE_KB
    }

    fn description(&self) -> &str {
        "Rebuilds the knowledge base from a document URL"
    }

    async fn run(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        let Some(url) = ctx.url.clone().filter(|url| !url.trim().is_empty()) else {
            ctx.response = Some(NO_URL_RESPONSE.to_string());
            ctx.record(self.name(), AgentStatus::Failed);
            return Ok(ctx);
        };

        match self.manager.rebuild(&url).await {
            Ok(metadata) => {
                ctx.response = Some(format!(
                    "Knowledge base rebuilt from {url}: {} chunks embedded with {}.",
                    metadata.chunk_count, metadata.embedding_model
                ));
                ctx.set_meta(META_KNOWLEDGE_BASE, serde_json::to_value(&metadata)?);
                ctx.record(self.name(), AgentStatus::Completed);
            }
            Err(e) => {
                warn!("Knowledge base rebuild from {url} failed: {e}");
                ctx.response = Some(format!("Knowledge base rebuild from {url} failed: {e}"));
                ctx.record(self.name(), AgentStatus::Failed);
            }
        }
        Ok(ctx)
    }
}
