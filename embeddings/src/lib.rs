//! # Embeddings
//!
//! Embedding generation and vector similarity search for the kbqa knowledge
//! base.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings                                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► VectorIndex                │
//! │       │                                  │                      │
//! │       ▼                                  ▼                      │
//! │  OpenAI-compatible API          cosine_similarity / top-k       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A provider is expensive to construct (HTTP client, model handles), so
//! callers build one per process and share it behind an `Arc`.

pub mod error;
pub mod index;
pub mod provider;
pub mod similarity;

pub use error::{EmbeddingError, Result};
pub use index::VectorIndex;
pub use provider::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, InputKind, OpenAIProvider,
};
pub use similarity::{SimilarityResult, cosine_similarity};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
