//! Similarity computation for embeddings.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// A zero vector has similarity 0.0 with everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (magnitude_a * magnitude_b))
}

/// A similarity search result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// Position of the matched vector in its index.
    pub position: usize,

    /// Similarity score.
    pub score: f32,
}

/// Find the top-k most similar embeddings.
///
/// Results are ordered by score descending; equal scores keep candidate order.
pub fn find_top_k(
    query: &[f32],
    candidates: &[Embedding],
    k: usize,
    min_score: f32,
) -> Result<Vec<SimilarityResult>> {
    let mut scores: Vec<(OrderedFloat<f32>, usize)> = Vec::with_capacity(candidates.len());

    for (position, embedding) in candidates.iter().enumerate() {
        let score = cosine_similarity(query, embedding)?;
        if score >= min_score {
            scores.push((OrderedFloat(score), position));
        }
    }

    scores.sort_by(|a, b| b.0.cmp(&a.0));

    Ok(scores
        .into_iter()
        .take(k)
        .map(|(score, position)| SimilarityResult {
            position,
            score: score.0,
        })
        .collect())
}

/// Normalize an embedding to unit length.
pub fn normalize(embedding: &mut [f32]) {
    let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in embedding.iter_mut() {
            *x /= magnitude;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cosine_similarity_identical() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[2.0, 0.0, 0.0]).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).unwrap();
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[-1.0, 0.0, 0.0]).unwrap();
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector() {
        let sim = cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap();
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_find_top_k() {
        let query = vec![1.0, 0.0, 0.0];
        let candidates = vec![
            vec![0.0, 1.0, 0.0], // similarity 0.0
            vec![1.0, 0.0, 0.0], // similarity 1.0
            vec![0.7, 0.7, 0.0], // similarity ~0.7
        ];

        let results = find_top_k(&query, &candidates, 2, -1.0).unwrap();
        let positions: Vec<usize> = results.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![1, 2]);
    }

    #[test]
    fn test_find_top_k_ties_keep_insertion_order() {
        let query = vec![1.0, 0.0];
        let candidates = vec![vec![1.0, 0.0], vec![2.0, 0.0], vec![0.0, 1.0]];

        let results = find_top_k(&query, &candidates, 3, -1.0).unwrap();
        let positions: Vec<usize> = results.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }
}
