use std::sync::Arc;

use async_trait::async_trait;
use kbqa_generation::{ChatMessage, GenerationProvider, GenerationRequest, complete};
use tracing::warn;

use crate::agent::{Agent, SUMMARY};
use crate::context::{AgentStatus, META_SUMMARY_ERROR, PipelineContext};
use crate::error::Result;

pub const NO_INPUT_SUMMARY: &str = "No input text provided for summarization.";

const SUMMARY_PROMPT: &str = "Summarize this text in about 25 words.";
const SUBJECT_PROMPT: &str = "Return only an email subject for the summarized text.";

/// Condenses the answer into a short summary plus an email subject.
pub struct SummaryAgent {
    generator: Arc<dyn GenerationProvider>,
}

impl SummaryAgent {
    pub fn new(generator: Arc<dyn GenerationProvider>) -> Self {
        Self { generator }
    }

    async fn ask(&self, instruction: &str, text: &str, max_tokens: u32) -> kbqa_generation::Result<String> {
        let request = GenerationRequest::new(vec![
            ChatMessage::system(instruction),
            ChatMessage::user(text),
        ])
        .with_max_tokens(max_tokens);
        Ok(complete(self.generator.as_ref(), request).await?.trim().to_string())
    }
}

#[async_trait]
impl Agent for SummaryAgent {
    fn name(&self) -> &str {
        SUMMARY
    }

    fn description(&self) -> &str {
        "Summarizes the response and writes an email subject for it"
    }

    async fn run(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        // Summarize the answer when there is one, otherwise the question.
        let text = ctx
            .response
            .as_deref()
            .filter(|response| !response.trim().is_empty())
            .unwrap_or(&ctx.query)
            .trim()
            .to_string();

        if text.is_empty() {
            ctx.summary = Some(NO_INPUT_SUMMARY.to_string());
            ctx.record(self.name(), AgentStatus::Failed);
            return Ok(ctx);
        }

        let summary = match self.ask(SUMMARY_PROMPT, &text, 300).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Summarization failed: {e}");
                ctx.set_meta(META_SUMMARY_ERROR, e.to_string());
                ctx.record(self.name(), AgentStatus::Failed);
                return Ok(ctx);
            }
        };

        let status = match self.ask(SUBJECT_PROMPT, &summary, 20).await {
            Ok(subject) => {
                ctx.subject = Some(subject.trim_matches('"').trim().to_string());
                AgentStatus::Completed
            }
            Err(e) => {
                warn!("Subject generation failed: {e}");
                ctx.set_meta(META_SUMMARY_ERROR, format!("subject: {e}"));
                AgentStatus::Failed
            }
        };

        ctx.summary = Some(summary);
        ctx.record(self.name(), status);
        Ok(ctx)
    }
}
