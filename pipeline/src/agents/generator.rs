use std::sync::Arc;

use async_trait::async_trait;
use kbqa_generation::{ChatMessage, GenerationProvider, GenerationRequest, Provenance, complete};
use tracing::{debug, error, warn};

use crate::agent::{Agent, MAIN};
use crate::context::{AgentStatus, META_GENERATION_ERROR, META_MODEL_USED, META_TIMESTAMP, PipelineContext};
use crate::error::{PipelineError, Result};

const SYSTEM_PROMPT: &str = "You are an AI expert.";

/// Unconstrained answer from the language model.
///
/// Stands down when the retriever already produced a grounded answer.
pub struct PrimaryGenerator {
    generator: Arc<dyn GenerationProvider>,
    max_tokens: u32,
    temperature: f32,
}

impl PrimaryGenerator {
    pub fn new(generator: Arc<dyn GenerationProvider>) -> Self {
        Self {
            generator,
            max_tokens: 1024,
            temperature: 0.5,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl Agent for PrimaryGenerator {
    fn name(&self) -> &str {
        MAIN
    }

    fn description(&self) -> &str {
        "Answers the query directly with the language model"
    }

    fn yields_to_grounded_answer(&self) -> bool {
        true
    }

    async fn run(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        let request = GenerationRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!("Answer this in 50 words: {}", ctx.query)),
        ])
        .with_max_tokens(self.max_tokens)
        .with_temperature(self.temperature);

        debug!("Generating fallback answer with {}", self.generator.model_id());
        match complete(self.generator.as_ref(), request).await {
            Ok(answer) => {
                let provenance = Provenance::now(self.generator.model_id());
                ctx.response = Some(answer.trim().to_string());
                ctx.set_meta(META_MODEL_USED, provenance.model_used);
                ctx.set_meta(META_TIMESTAMP, provenance.timestamp);
                ctx.record(self.name(), AgentStatus::Completed);
                Ok(ctx)
            }
            Err(e) if e.is_outage() => {
                error!("Generation provider unavailable: {e}");
                Err(PipelineError::ProviderOutage(e.to_string()))
            }
            Err(e) => {
                warn!("Fallback generation failed: {e}");
                ctx.set_meta(META_GENERATION_ERROR, e.to_string());
                ctx.record(self.name(), AgentStatus::Failed);
                Ok(ctx)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbqa_test_support::{GeneratorFailure, ScriptedGenerator};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_answers_with_provenance() {
        let generator = Arc::new(ScriptedGenerator::new("Mars has no capital."));
        let agent = PrimaryGenerator::new(generator.clone());

        let ctx = agent
            .run(PipelineContext::new("what is the capital of Mars"))
            .await
            .unwrap();

        assert_eq!(ctx.response.as_deref(), Some("Mars has no capital."));
        assert_eq!(ctx.meta_str(META_MODEL_USED), Some("scripted-test"));
        assert!(ctx.meta_str(META_TIMESTAMP).unwrap().ends_with('Z'));
        assert_eq!(ctx.trace[0].status, AgentStatus::Completed);

        let request = &generator.requests()[0];
        assert_eq!(request.messages[0].content, "You are an AI expert.");
        assert_eq!(
            request.messages[1].content,
            "Answer this in 50 words: what is the capital of Mars"
        );
        assert_eq!(request.max_tokens, 1024);
        assert_eq!(request.temperature, Some(0.5));
    }

    #[tokio::test]
    async fn test_outage_ends_the_run() {
        let agent = PrimaryGenerator::new(Arc::new(ScriptedGenerator::failing(GeneratorFailure::Outage)));

        let result = agent.run(PipelineContext::new("q")).await;

        assert!(matches!(result, Err(PipelineError::ProviderOutage(_))));
    }

    #[tokio::test]
    async fn test_rejected_request_is_recorded() {
        let agent =
            PrimaryGenerator::new(Arc::new(ScriptedGenerator::failing(GeneratorFailure::BadRequest)));

        let ctx = agent.run(PipelineContext::new("q")).await.unwrap();

        assert_eq!(ctx.response, None);
        assert!(ctx.meta.contains_key(META_GENERATION_ERROR));
        assert_eq!(ctx.trace[0].status, AgentStatus::Failed);
    }
}
