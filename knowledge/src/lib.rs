//! # Knowledge Base
//!
//! Turns one source document into a searchable snapshot and answers queries
//! from it when, and only when, the query is relevant.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Knowledge Base                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  rebuild(url)                          retrieve(query)          │
//! │      │                                       │                  │
//! │      ▼                                       ▼                  │
//! │  ┌───────────┐  ┌─────────┐          ┌──────────────┐           │
//! │  │ Extractor │─►│ Chunker │          │  LiveIndex   │           │
//! │  └───────────┘  └─────────┘          │  (snapshot)  │           │
//! │                      │               └──────────────┘           │
//! │                      ▼                       │ top-k            │
//! │               ┌────────────┐  publish        ▼                  │
//! │               │ IndexStore │───────►  ┌──────────────┐          │
//! │               │ (on disk)  │          │RelevanceGate │          │
//! │               └────────────┘          └──────────────┘          │
//! │                                              │ accepted         │
//! │                                              ▼                  │
//! │                                     ┌──────────────────┐        │
//! │                                     │RetrievalAnswerer │        │
//! │                                     └──────────────────┘        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kbqa_knowledge::{KnowledgeBaseManager, Retrieval};
//!
//! let metadata = manager.rebuild("https://example.com/electronics").await?;
//! match retriever.retrieve("What is an electronic device?").await? {
//!     Retrieval::Answered { answer, .. } => println!("{answer}"),
//!     _ => println!("not in the knowledge base"),
//! }
//! ```

pub mod answerer;
pub mod chunker;
pub mod config;
pub mod error;
pub mod extraction;
pub mod gate;
pub mod lifecycle;
pub mod retriever;
pub mod snapshot;
pub mod store;
pub mod tokenizer;

pub use answerer::RetrievalAnswerer;
pub use chunker::{Chunk, ChunkSpan, Chunker};
pub use config::KnowledgeConfig;
pub use error::{KnowledgeError, Result};
pub use extraction::{DocumentExtractor, ExtractionError, HttpExtractor};
pub use gate::{Relevance, RelevanceGate};
pub use lifecycle::{KnowledgeBaseManager, KnowledgeBaseMetadata};
pub use retriever::{LiveIndex, Retrieval, Retriever};
pub use snapshot::{IndexedVector, ScoredChunk, Snapshot, SnapshotManifest};
pub use store::IndexStore;
pub use tokenizer::{Cl100kTokenizer, TokenCounter, WordCounter};
