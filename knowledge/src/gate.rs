//! Relevance gate deciding whether retrieved context can be trusted.

use kbqa_embeddings::{EmbeddingProvider, EmbeddingRequest, cosine_similarity};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunker::Chunk;
use crate::error::Result;

/// Outcome of a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Relevance {
    /// Similarity between query and top chunk; `None` when there was no chunk.
    pub similarity: Option<f32>,

    pub accepted: bool,
}

/// Accepts retrieval only when the best chunk is close enough to the query.
#[derive(Debug, Clone, Copy)]
pub struct RelevanceGate {
    threshold: f32,
}

impl RelevanceGate {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Whether `similarity` clears the threshold. Inclusive.
    pub fn admits(&self, similarity: f32) -> bool {
        similarity >= self.threshold
    }

    /// Score `top` against `query` and decide.
    ///
    /// Both texts are embedded afresh: the query through the query path, the
    /// chunk through the document path. Without a chunk the provider is not
    /// called and the result is a rejection.
    pub async fn evaluate(
        &self,
        embedder: &dyn EmbeddingProvider,
        query: &str,
        top: Option<&Chunk>,
    ) -> Result<Relevance> {
        let Some(top) = top else {
            return Ok(Relevance {
                similarity: None,
                accepted: false,
            });
        };

        let query_vector = embedder.embed(EmbeddingRequest::query(query)).await?;
        let chunk_vector = embedder
            .embed(EmbeddingRequest::document(top.text.clone()))
            .await?;
        let similarity = cosine_similarity(&query_vector.embedding, &chunk_vector.embedding)?;

        let accepted = self.admits(similarity);
        debug!(
            "Relevance {similarity:.3} against threshold {:.3}: {}",
            self.threshold,
            if accepted { "accepted" } else { "rejected" }
        );
        Ok(Relevance {
            similarity: Some(similarity),
            accepted,
        })
    }

    /// Shorthand for [`Self::evaluate`] returning only the decision.
    pub async fn accept(
        &self,
        embedder: &dyn EmbeddingProvider,
        query: &str,
        top: Option<&Chunk>,
    ) -> Result<bool> {
        Ok(self.evaluate(embedder, query, top).await?.accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkSpan;
    use kbqa_test_support::VocabularyEmbedder;

    fn chunk(text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            span: ChunkSpan {
                ordinal: 0,
                start_word: 0,
                end_word: text.split_whitespace().count(),
            },
            tokens: 0,
        }
    }

    #[tokio::test]
    async fn test_related_query_is_accepted() {
        let embedder = VocabularyEmbedder::electronics();
        let top = chunk("Electronic devices process electrical signals.");

        let relevance = RelevanceGate::new(0.3)
            .evaluate(&embedder, "What is an electronic device?", Some(&top))
            .await
            .unwrap();

        assert!(relevance.accepted);
        assert!(relevance.similarity.unwrap() > 0.6);
        assert_eq!(embedder.calls(), 2);
        assert_eq!(embedder.query_calls(), 1);
    }

    #[tokio::test]
    async fn test_unrelated_query_is_rejected() {
        let embedder = VocabularyEmbedder::electronics();
        let top = chunk("Electronic devices process electrical signals.");

        let relevance = RelevanceGate::new(0.3)
            .evaluate(&embedder, "What is the capital of Mars?", Some(&top))
            .await
            .unwrap();

        assert!(!relevance.accepted);
        assert_eq!(relevance.similarity, Some(0.0));
    }

    #[tokio::test]
    async fn test_no_chunk_rejects_without_embedding() {
        let embedder = VocabularyEmbedder::electronics();

        let relevance = RelevanceGate::new(-1.0)
            .evaluate(&embedder, "anything", None)
            .await
            .unwrap();

        assert_eq!(
            relevance,
            Relevance {
                similarity: None,
                accepted: false
            }
        );
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_acceptance_is_monotone_in_threshold() {
        let embedder = VocabularyEmbedder::electronics();
        let top = chunk("Electronic devices process electrical signals.");
        let thresholds = [-1.0, 0.0, 0.3, 0.5, 0.63, 0.7, 0.9, 1.0];

        let mut decisions = Vec::new();
        for threshold in thresholds {
            decisions.push(
                RelevanceGate::new(threshold)
                    .accept(&embedder, "What is an electronic device?", Some(&top))
                    .await
                    .unwrap(),
            );
        }

        // Once rejected, every stricter threshold rejects too.
        let first_rejection = decisions.iter().position(|d| !d).unwrap();
        assert!(decisions[..first_rejection].iter().all(|d| *d));
        assert!(decisions[first_rejection..].iter().all(|d| !d));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let gate = RelevanceGate::new(0.3);
        assert!(gate.admits(0.3));
        assert!(!gate.admits(0.299_99));
    }
}
