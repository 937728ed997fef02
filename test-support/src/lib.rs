//! Deterministic stand-ins for the embedding and generation providers.
//!
//! Tests across the workspace use these instead of network-backed
//! providers so similarity scores and answers are predictable.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use kbqa_embeddings::{
    EmbeddingError, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, InputKind,
};
use kbqa_generation::{GenerationError, GenerationProvider, GenerationRequest, TextStream};

/// Vocabulary shared by the electronics scenarios.
pub const ELECTRONICS_VOCABULARY: &[&str] = &[
    "electronic",
    "device",
    "process",
    "electrical",
    "signal",
    "circuit",
    "capital",
    "mars",
    "planet",
];

/// Bag-of-words embedder over a fixed vocabulary.
///
/// Each dimension counts the words of the input that start with the
/// corresponding vocabulary entry (case-insensitive), so `"devices"` lands
/// on `"device"`. Words outside the vocabulary are ignored.
pub struct VocabularyEmbedder {
    vocabulary: Vec<String>,
    model: String,
    calls: AtomicUsize,
    query_calls: AtomicUsize,
}

impl VocabularyEmbedder {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_lowercase()).collect(),
            model: "vocabulary-test".to_string(),
            calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
        }
    }

    /// Embedder over [`ELECTRONICS_VOCABULARY`].
    pub fn electronics() -> Self {
        Self::new(ELECTRONICS_VOCABULARY)
    }

    /// Report a different model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Number of texts embedded so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of query-side texts embedded so far.
    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    /// The vector this embedder produces for `text`.
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.vocabulary.len()];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            if let Some(slot) = self.vocabulary.iter().position(|v| word.starts_with(v.as_str())) {
                vector[slot] += 1.0;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for VocabularyEmbedder {
    fn name(&self) -> &str {
        "vocabulary"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.vocabulary.len()
    }

    async fn embed(&self, request: EmbeddingRequest) -> kbqa_embeddings::Result<EmbeddingResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.kind == InputKind::Query {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
        }
        let embedding = self.vector(&request.text);
        Ok(EmbeddingResponse {
            dimension: embedding.len(),
            embedding,
            model: self.model.clone(),
            tokens_used: None,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Embedder whose every call fails like an unreachable API.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn name(&self) -> &str {
        "failing"
    }

    fn model_id(&self) -> &str {
        "failing-test"
    }

    fn dimension(&self) -> usize {
        3
    }

    async fn embed(&self, _request: EmbeddingRequest) -> kbqa_embeddings::Result<EmbeddingResponse> {
        Err(EmbeddingError::ApiRequest("503: embedding service unavailable".to_string()))
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// How a [`ScriptedGenerator`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorFailure {
    /// Provider is down (HTTP 503).
    Outage,
    /// Provider rejects the request (HTTP 400).
    BadRequest,
}

/// Generator that replays canned answers and records every request.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<String>>,
    default_reply: String,
    failure: Option<GeneratorFailure>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    /// Answer every request with `reply`.
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: reply.into(),
            failure: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer requests with `replies` in order, then with the default reply.
    pub fn with_replies(self, replies: &[&str]) -> Self {
        *self.replies.lock().unwrap_or_else(PoisonError::into_inner) =
            replies.iter().map(|r| (*r).to_string()).collect();
        self
    }

    /// Fail every request.
    pub fn failing(failure: GeneratorFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::new("")
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests received so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-test"
    }

    async fn generate(&self, request: GenerationRequest) -> kbqa_generation::Result<TextStream> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        match self.failure {
            Some(GeneratorFailure::Outage) => {
                return Err(GenerationError::ApiRequest {
                    status: 503,
                    body: "service unavailable".to_string(),
                });
            }
            Some(GeneratorFailure::BadRequest) => {
                return Err(GenerationError::ApiRequest {
                    status: 400,
                    body: "bad request".to_string(),
                });
            }
            None => {}
        }

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone());

        // Split on word boundaries so callers really concatenate fragments.
        let fragments: Vec<kbqa_generation::Result<String>> = reply
            .split_inclusive(' ')
            .map(|fragment| Ok(fragment.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(fragments)))
    }

    fn is_available(&self) -> bool {
        self.failure.is_none()
    }
}
