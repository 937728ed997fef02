//! Ordered, dimension-locked vector index.

use tracing::debug;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::similarity::{SimilarityResult, find_top_k, normalize};

/// A flat similarity index over normalized embeddings.
///
/// Vectors are addressed by insertion position, which lets callers keep the
/// payload for each vector in a parallel `Vec`. Every vector must have the
/// index's dimension.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    /// Stored vectors, normalized to unit length.
    vectors: Vec<Embedding>,

    /// Expected dimension of embeddings.
    dimension: usize,
}

impl VectorIndex {
    /// Create an empty index for vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: Vec::new(),
            dimension,
        }
    }

    /// Build an index from existing vectors, checking every dimension.
    pub fn from_vectors(dimension: usize, vectors: impl IntoIterator<Item = Embedding>) -> Result<Self> {
        let mut index = Self::new(dimension);
        for vector in vectors {
            index.push(vector)?;
        }
        Ok(index)
    }

    /// Append a vector, returning its position.
    pub fn push(&mut self, mut embedding: Embedding) -> Result<usize> {
        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        normalize(&mut embedding);
        self.vectors.push(embedding);
        Ok(self.vectors.len() - 1)
    }

    /// Get the normalized vector at `position`.
    pub fn get(&self, position: usize) -> Option<&[f32]> {
        self.vectors.get(position).map(Vec::as_slice)
    }

    /// Dimension every vector shares.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Get the number of vectors in the index.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Search for the `k` vectors most similar to `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SimilarityResult>> {
        if query.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let results = find_top_k(query, &self.vectors, k, f32::MIN)?;
        debug!("Vector search returned {} of {} entries", results.len(), self.len());
        Ok(results)
    }
}
