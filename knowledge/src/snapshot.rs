//! Immutable, searchable snapshots of an embedded document.

use chrono::{DateTime, Utc};
use kbqa_embeddings::{Embedding, EmbeddingError, VectorIndex};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chunker::Chunk;
use crate::error::{KnowledgeError, Result};

/// Version of the on-disk snapshot layout.
pub const FORMAT_VERSION: u32 = 1;

/// A chunk together with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedVector {
    pub chunk: Chunk,
    pub embedding: Embedding,
}

/// A chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,

    /// Cosine similarity to the query.
    pub score: f32,
}

/// Describes a persisted snapshot. Written next to the vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub format_version: u32,
    pub snapshot_id: String,
    pub embedding_model: String,
    pub dimension: usize,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

/// The indexed form of one source document.
///
/// Snapshots are never mutated; a rebuild produces a new one.
#[derive(Debug, Clone)]
pub struct Snapshot {
    manifest: SnapshotManifest,
    chunks: Vec<Chunk>,
    index: VectorIndex,
}

impl Snapshot {
    /// Build a snapshot from embedded chunks.
    ///
    /// Every embedding must share the dimension of the first.
    pub fn new(embedding_model: impl Into<String>, vectors: Vec<IndexedVector>) -> Result<Self> {
        let dimension = vectors
            .first()
            .map(|v| v.embedding.len())
            .ok_or(KnowledgeError::EmptySource)?;

        let manifest = SnapshotManifest {
            format_version: FORMAT_VERSION,
            snapshot_id: Uuid::new_v4().to_string(),
            embedding_model: embedding_model.into(),
            dimension,
            chunk_count: vectors.len(),
            created_at: Utc::now(),
        };
        Self::assemble(manifest, vectors).map_err(KnowledgeError::from)
    }

    /// Reassemble a persisted snapshot, checking it against its manifest.
    pub fn restore(manifest: SnapshotManifest, vectors: Vec<IndexedVector>) -> Result<Self> {
        if manifest.format_version != FORMAT_VERSION {
            return Err(KnowledgeError::CorruptSnapshot(format!(
                "unsupported format version {}",
                manifest.format_version
            )));
        }
        if manifest.chunk_count != vectors.len() || vectors.is_empty() {
            return Err(KnowledgeError::CorruptSnapshot(format!(
                "manifest lists {} chunks, found {}",
                manifest.chunk_count,
                vectors.len()
            )));
        }
        Self::assemble(manifest, vectors)
            .map_err(|e| KnowledgeError::CorruptSnapshot(e.to_string()))
    }

    fn assemble(
        manifest: SnapshotManifest,
        vectors: Vec<IndexedVector>,
    ) -> std::result::Result<Self, EmbeddingError> {
        let mut index = VectorIndex::new(manifest.dimension);
        let mut chunks = Vec::with_capacity(vectors.len());
        for vector in vectors {
            index.push(vector.embedding)?;
            chunks.push(vector.chunk);
        }
        Ok(Self {
            manifest,
            chunks,
            index,
        })
    }

    pub fn id(&self) -> &str {
        &self.manifest.snapshot_id
    }

    pub fn manifest(&self) -> &SnapshotManifest {
        &self.manifest
    }

    /// Model that produced the embeddings.
    pub fn embedding_model(&self) -> &str {
        &self.manifest.embedding_model
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunks paired with their (normalized) embeddings, in chunk order.
    pub fn indexed_vectors(&self) -> Vec<IndexedVector> {
        self.chunks
            .iter()
            .enumerate()
            .filter_map(|(position, chunk)| {
                self.index.get(position).map(|embedding| IndexedVector {
                    chunk: chunk.clone(),
                    embedding: embedding.to_vec(),
                })
            })
            .collect()
    }

    /// The `k` chunks most similar to `query`, best first.
    ///
    /// Ties keep chunk order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let hits = self.index.search(query, k)?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                self.chunks.get(hit.position).map(|chunk| ScoredChunk {
                    chunk: chunk.clone(),
                    score: hit.score,
                })
            })
            .collect())
    }
}
