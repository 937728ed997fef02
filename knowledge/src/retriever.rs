//! Query-side retrieval over the live snapshot.

use std::sync::Arc;

use kbqa_embeddings::{EmbeddingError, EmbeddingProvider, EmbeddingRequest};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::answerer::RetrievalAnswerer;
use crate::chunker::Chunk;
use crate::error::Result;
use crate::gate::RelevanceGate;
use crate::snapshot::{ScoredChunk, Snapshot};
use crate::store::IndexStore;

/// The snapshot queries currently run against.
///
/// Readers clone the `Arc` and drop the lock straight away, so a rebuild
/// swapping in a new snapshot never waits on an in-flight query.
#[derive(Debug, Default)]
pub struct LiveIndex {
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl LiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(snapshot))),
        }
    }

    /// The active snapshot, if a knowledge base has been built.
    pub async fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.read().await.clone()
    }

    /// Make `snapshot` the active one, returning the one it replaces.
    pub async fn publish(&self, snapshot: Arc<Snapshot>) -> Option<Arc<Snapshot>> {
        let mut current = self.current.write().await;
        info!("Publishing snapshot {}", snapshot.id());
        current.replace(snapshot)
    }

    /// Forget the active snapshot.
    pub async fn clear(&self) -> Option<Arc<Snapshot>> {
        self.current.write().await.take()
    }

    /// Search the active snapshot; empty when there is none.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let snapshot = self.current().await;
        IndexStore::search(snapshot.as_deref(), query, k)
    }
}

/// What retrieval produced for one query.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// The gate accepted the top chunk and the answerer replied.
    Answered { answer: String, similarity: f32 },

    /// The top chunk was not relevant enough, or the answer came back empty.
    Rejected { similarity: Option<f32> },

    /// No snapshot has been built yet.
    NoKnowledgeBase,
}

/// Embeds a query, searches the live snapshot, gates and answers.
pub struct Retriever {
    live: Arc<LiveIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    gate: RelevanceGate,
    answerer: RetrievalAnswerer,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        live: Arc<LiveIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        gate: RelevanceGate,
        answerer: RetrievalAnswerer,
    ) -> Self {
        Self {
            live,
            embedder,
            gate,
            answerer,
            top_k: 3,
        }
    }

    /// Set how many chunks are handed to the answerer.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn live(&self) -> &Arc<LiveIndex> {
        &self.live
    }

    /// Model the grounded answers come from.
    pub fn answer_model(&self) -> &str {
        self.answerer.model_id()
    }

    /// Answer `query` from the knowledge base if it is relevant.
    pub async fn retrieve(&self, query: &str) -> Result<Retrieval> {
        let Some(snapshot) = self.live.current().await else {
            warn!("Knowledge base not built yet; skipping retrieval");
            return Ok(Retrieval::NoKnowledgeBase);
        };

        if snapshot.embedding_model() != self.embedder.model_id() {
            return Err(EmbeddingError::ModelMismatch {
                expected: snapshot.embedding_model().to_string(),
                actual: self.embedder.model_id().to_string(),
            }
            .into());
        }

        let query_vector = self
            .embedder
            .embed(EmbeddingRequest::query(query))
            .await?
            .embedding;
        let hits = IndexStore::search(Some(snapshot.as_ref()), &query_vector, self.top_k)?;
        for (rank, hit) in hits.iter().enumerate() {
            debug!(
                "Hit {rank} ({:.3}): {}",
                hit.score,
                hit.chunk.text.chars().take(100).collect::<String>()
            );
        }

        let relevance = self
            .gate
            .evaluate(self.embedder.as_ref(), query, hits.first().map(|hit| &hit.chunk))
            .await?;
        let similarity = match relevance.similarity {
            Some(similarity) if relevance.accepted => similarity,
            _ => {
                info!(
                    "Query not relevant to knowledge base (similarity {:?}, threshold {})",
                    relevance.similarity,
                    self.gate.threshold()
                );
                return Ok(Retrieval::Rejected {
                    similarity: relevance.similarity,
                });
            }
        };

        let chunks: Vec<Chunk> = hits.into_iter().map(|hit| hit.chunk).collect();
        let answer = self.answerer.answer(query, &chunks).await?;
        if answer.is_empty() {
            info!("Grounded answer came back empty");
            return Ok(Retrieval::Rejected {
                similarity: Some(similarity),
            });
        }

        Ok(Retrieval::Answered { answer, similarity })
    }
}
