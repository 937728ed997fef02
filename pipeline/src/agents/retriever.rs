use std::sync::Arc;

use async_trait::async_trait;
use kbqa_generation::Provenance;
use kbqa_knowledge::{Retrieval, Retriever};
use tracing::{info, warn};

use crate::agent::{Agent, RETRIEVER};
use crate::context::{
    AgentStatus, META_MODEL_USED, META_RETRIEVAL_ERROR, META_SIMILARITY, META_SOURCE,
    META_TIMESTAMP, PipelineContext, SOURCE_MODEL_FALLBACK, SOURCE_VECTORSTORE,
};
use crate::error::Result;

/// Placeholder response until the fallback generator answers.
pub const NOT_FOUND_RESPONSE: &str = "I couldn’t find a relevant answer in the knowledge base.";

/// Answers from the knowledge base when the query is relevant to it.
pub struct RetrieverAgent {
    retriever: Arc<Retriever>,
}

impl RetrieverAgent {
    pub fn new(retriever: Arc<Retriever>) -> Self {
        Self { retriever }
    }

    fn fall_back(ctx: &mut PipelineContext) {
        ctx.response = Some(NOT_FOUND_RESPONSE.to_string());
        ctx.set_meta(META_SOURCE, SOURCE_MODEL_FALLBACK);
    }
}

#[async_trait]
impl Agent for RetrieverAgent {
    fn name(&self) -> &str {
        RETRIEVER
    }

    fn description(&self) -> &str {
        "Answers from the knowledge base when the query is relevant to it"
    }

    async fn run(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        let status = match self.retriever.retrieve(&ctx.query).await {
            Ok(Retrieval::Answered { answer, similarity }) => {
                info!("Grounded answer found (similarity {similarity:.3})");
                let provenance = Provenance::now(self.retriever.answer_model());
                ctx.response = Some(answer);
                ctx.set_meta(META_SOURCE, SOURCE_VECTORSTORE);
                ctx.set_meta(META_SIMILARITY, similarity);
                ctx.set_meta(META_MODEL_USED, provenance.model_used);
                ctx.set_meta(META_TIMESTAMP, provenance.timestamp);
                AgentStatus::Completed
            }
            Ok(Retrieval::Rejected { similarity }) => {
                if let Some(similarity) = similarity {
                    ctx.set_meta(META_SIMILARITY, similarity);
                }
                Self::fall_back(&mut ctx);
                AgentStatus::Completed
            }
            Ok(Retrieval::NoKnowledgeBase) => {
                Self::fall_back(&mut ctx);
                AgentStatus::Completed
            }
            Err(e) => {
                warn!("Retrieval failed, falling back to the model: {e}");
                ctx.set_meta(META_RETRIEVAL_ERROR, e.to_string());
                Self::fall_back(&mut ctx);
                AgentStatus::Failed
            }
        };

        ctx.record(self.name(), status);
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbqa_knowledge::{
        Chunker, IndexedVector, LiveIndex, RelevanceGate, RetrievalAnswerer, Snapshot,
        WordCounter,
    };
    use kbqa_test_support::{FailingEmbedder, ScriptedGenerator, VocabularyEmbedder};
    use pretty_assertions::assert_eq;

    fn live_with(text: &str) -> Arc<LiveIndex> {
        let embedder = VocabularyEmbedder::electronics();
        let vectors = Chunker::new(Arc::new(WordCounter))
            .split(text, 10, 2)
            .unwrap()
            .into_iter()
            .map(|chunk| IndexedVector {
                embedding: embedder.vector(&chunk.text),
                chunk,
            })
            .collect();
        Arc::new(LiveIndex::with_snapshot(
            Snapshot::new("vocabulary-test", vectors).unwrap(),
        ))
    }

    fn agent(live: Arc<LiveIndex>, embedder: Arc<dyn kbqa_embeddings::EmbeddingProvider>) -> RetrieverAgent {
        RetrieverAgent::new(Arc::new(Retriever::new(
            live,
            embedder,
            RelevanceGate::new(0.3),
            RetrievalAnswerer::new(Arc::new(ScriptedGenerator::new(
                "They process electrical signals.",
            ))),
        )))
    }

    #[tokio::test]
    async fn test_grounded_answer_sets_vectorstore_source() {
        let agent = agent(
            live_with("Electronic devices process electrical signals."),
            Arc::new(VocabularyEmbedder::electronics()),
        );

        let ctx = agent.run(PipelineContext::new("what is an electronic device")).await.unwrap();

        assert_eq!(ctx.response.as_deref(), Some("They process electrical signals."));
        assert_eq!(ctx.source(), Some(SOURCE_VECTORSTORE));
        assert_eq!(ctx.meta_str(META_MODEL_USED), Some("scripted-test"));
        assert!(ctx.meta[META_SIMILARITY].as_f64().unwrap() > 0.6);
        assert_eq!(ctx.trace.len(), 1);
        assert_eq!(ctx.trace[0].status, AgentStatus::Completed);
    }

    #[tokio::test]
    async fn test_irrelevant_query_falls_back() {
        let agent = agent(
            live_with("Electronic devices process electrical signals."),
            Arc::new(VocabularyEmbedder::electronics()),
        );

        let ctx = agent.run(PipelineContext::new("what is the capital of Mars")).await.unwrap();

        assert_eq!(ctx.response.as_deref(), Some(NOT_FOUND_RESPONSE));
        assert_eq!(ctx.source(), Some(SOURCE_MODEL_FALLBACK));
        assert_eq!(ctx.trace[0].status, AgentStatus::Completed);
    }

    #[tokio::test]
    async fn test_empty_index_falls_back() {
        let agent = agent(
            Arc::new(LiveIndex::new()),
            Arc::new(VocabularyEmbedder::electronics()),
        );

        let ctx = agent.run(PipelineContext::new("what is an electronic device")).await.unwrap();

        assert_eq!(ctx.source(), Some(SOURCE_MODEL_FALLBACK));
        assert!(!ctx.meta.contains_key(META_SIMILARITY));
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades_to_fallback() {
        // Snapshot model must match the failing embedder for the query to reach it.
        let vectors = vec![IndexedVector {
            chunk: Chunker::new(Arc::new(WordCounter))
                .split("Electronic devices process electrical signals.", 10, 0)
                .unwrap()
                .remove(0),
            embedding: vec![1.0, 0.0, 0.0],
        }];
        let live = Arc::new(LiveIndex::with_snapshot(
            Snapshot::new("failing-test", vectors).unwrap(),
        ));
        let agent = agent(live, Arc::new(FailingEmbedder));

        let ctx = agent.run(PipelineContext::new("what is an electronic device")).await.unwrap();

        assert_eq!(ctx.source(), Some(SOURCE_MODEL_FALLBACK));
        assert!(ctx.meta_str(META_RETRIEVAL_ERROR).unwrap().contains("503"));
        assert_eq!(ctx.trace[0].status, AgentStatus::Failed);
    }
}
