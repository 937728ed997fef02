//! Building, replacing and restoring the knowledge base.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::chunker::Chunker;
use crate::config::KnowledgeConfig;
use crate::error::{KnowledgeError, Result};
use crate::extraction::DocumentExtractor;
use crate::retriever::LiveIndex;
use crate::snapshot::Snapshot;
use crate::store::IndexStore;

/// Summary of a completed rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBaseMetadata {
    pub status: String,
    pub source_url: String,
    pub embedding_model: String,
    pub storage_path: PathBuf,

    /// Tokens in the extracted document.
    pub total_tokens: usize,

    /// Tokens sent for embedding, overlap included.
    pub embedded_tokens: usize,

    pub chunk_count: usize,
    pub snapshot_id: String,
}

/// Owns the persisted snapshot and keeps the live index in step with it.
pub struct KnowledgeBaseManager {
    extractor: Arc<dyn DocumentExtractor>,
    chunker: Chunker,
    store: Arc<IndexStore>,
    live: Arc<LiveIndex>,
    max_tokens: usize,
    overlap: usize,

    /// Serializes rebuilds; queries never take it. A commit in flight owns
    /// a guard, so it keeps the lock even after its caller gives up.
    rebuild_lock: Arc<Mutex<()>>,
}

impl KnowledgeBaseManager {
    pub fn new(
        config: &KnowledgeConfig,
        extractor: Arc<dyn DocumentExtractor>,
        chunker: Chunker,
        store: IndexStore,
        live: Arc<LiveIndex>,
    ) -> Self {
        Self {
            extractor,
            chunker,
            store: Arc::new(store),
            live,
            max_tokens: config.max_tokens,
            overlap: config.overlap,
            rebuild_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn live(&self) -> &Arc<LiveIndex> {
        &self.live
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Replace the knowledge base with the document at `url`.
    ///
    /// The new snapshot is persisted before it goes live. If any step fails
    /// the previous snapshot stays in place, on disk and in memory.
    ///
    /// Once embedding starts, the commit runs on its own task: dropping this
    /// future (a caller timeout, say) no longer interrupts it, and later
    /// rebuilds or restores wait for it to finish.
    pub async fn rebuild(&self, url: &str) -> Result<KnowledgeBaseMetadata> {
        let guard = self.rebuild_lock.clone().lock_owned().await;
        info!("Rebuilding knowledge base from {url}");

        let text = self.extractor.extract(url).await?;

        let chunker = self.chunker.clone();
        let (max_tokens, overlap) = (self.max_tokens, self.overlap);
        let (total_tokens, chunks) = tokio::task::spawn_blocking(move || {
            let total_tokens = chunker.count_tokens(&text);
            chunker
                .split(&text, max_tokens, overlap)
                .map(|chunks| (total_tokens, chunks))
        })
        .await??;
        let embedded_tokens = chunks.iter().map(|chunk| chunk.tokens).sum();

        let store = self.store.clone();
        let live = self.live.clone();
        let snapshot = tokio::spawn(async move {
            let _guard = guard;
            let snapshot = Arc::new(store.build(chunks).await?);
            live.publish(snapshot.clone()).await;
            Ok::<_, KnowledgeError>(snapshot)
        })
        .await??;

        let metadata = KnowledgeBaseMetadata {
            status: "done".to_string(),
            source_url: url.to_string(),
            embedding_model: snapshot.embedding_model().to_string(),
            storage_path: self.store.path().to_path_buf(),
            total_tokens,
            embedded_tokens,
            chunk_count: snapshot.len(),
            snapshot_id: snapshot.id().to_string(),
        };
        info!(
            "Knowledge base {} ready: {} chunks, {} of {} tokens embedded",
            metadata.snapshot_id, metadata.chunk_count, embedded_tokens, total_tokens
        );
        Ok(metadata)
    }

    /// Publish the persisted snapshot, if one is usable.
    pub async fn restore(&self) -> Option<Arc<Snapshot>> {
        let _guard = self.rebuild_lock.lock().await;
        let snapshot = Arc::new(self.store.load().await?);
        self.live.publish(snapshot.clone()).await;
        Some(snapshot)
    }

    /// Drop the knowledge base, persisted and live.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.rebuild_lock.lock().await;
        if self.live.clear().await.is_none() {
            warn!("Clearing a knowledge base that was not loaded");
        }
        self.store.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ExtractionError;
    use crate::tokenizer::WordCounter;
    use async_trait::async_trait;
    use kbqa_embeddings::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
    use std::time::Duration;
    use kbqa_test_support::{FailingEmbedder, VocabularyEmbedder};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct StaticExtractor(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl DocumentExtractor for StaticExtractor {
        async fn extract(&self, url: &str) -> std::result::Result<String, ExtractionError> {
            self.0
                .get(url)
                .map(|text| (*text).to_string())
                .ok_or_else(|| ExtractionError::Unreachable {
                    url: url.to_string(),
                    reason: "HTTP 404 Not Found".to_string(),
                })
        }
    }

    /// Takes its time over every embedding.
    struct SlowEmbedder(VocabularyEmbedder);

    #[async_trait]
    impl EmbeddingProvider for SlowEmbedder {
        fn name(&self) -> &str {
            "slow"
        }

        fn model_id(&self) -> &str {
            self.0.model_id()
        }

        fn dimension(&self) -> usize {
            self.0.dimension()
        }

        async fn embed(&self, request: EmbeddingRequest) -> kbqa_embeddings::Result<EmbeddingResponse> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.0.embed(request).await
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn manager(dir: &TempDir, embedder: Arc<dyn EmbeddingProvider>) -> KnowledgeBaseManager {
        let config = KnowledgeConfig::new(dir.path().join("index")).with_chunking(4, 1);
        let extractor = StaticExtractor(HashMap::from([
            ("https://kb/electronics", "Electronic devices process electrical signals."),
            ("https://kb/mars", "Mars is the fourth planet from the sun."),
        ]));
        KnowledgeBaseManager::new(
            &config,
            Arc::new(extractor),
            Chunker::new(Arc::new(WordCounter)),
            IndexStore::new(config.index_dir.clone(), embedder),
            Arc::new(LiveIndex::new()),
        )
    }

    #[tokio::test]
    async fn test_rebuild_reports_and_publishes() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Arc::new(VocabularyEmbedder::electronics()));

        let metadata = manager.rebuild("https://kb/electronics").await.unwrap();

        assert_eq!(metadata.status, "done");
        assert_eq!(metadata.embedding_model, "vocabulary-test");
        assert_eq!(metadata.total_tokens, 5);
        // Four words, then the shared fourth word plus the fifth.
        assert_eq!(metadata.chunk_count, 2);
        assert_eq!(metadata.embedded_tokens, 6);
        assert_eq!(metadata.storage_path, dir.path().join("index"));

        let live = manager.live().current().await.unwrap();
        assert_eq!(live.id(), metadata.snapshot_id);
    }

    #[tokio::test]
    async fn test_rebuild_replaces_live_snapshot() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Arc::new(VocabularyEmbedder::electronics()));

        let first = manager.rebuild("https://kb/mars").await.unwrap();
        let second = manager.rebuild("https://kb/electronics").await.unwrap();

        assert_ne!(first.snapshot_id, second.snapshot_id);
        assert_eq!(manager.live().current().await.unwrap().id(), second.snapshot_id);
        assert_eq!(manager.store().load().await.unwrap().id(), second.snapshot_id);
    }

    #[tokio::test]
    async fn test_failed_extraction_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Arc::new(VocabularyEmbedder::electronics()));
        let first = manager.rebuild("https://kb/electronics").await.unwrap();

        let err = manager.rebuild("https://kb/missing").await.unwrap_err();

        assert!(matches!(err, KnowledgeError::Extraction(_)));
        assert_eq!(manager.live().current().await.unwrap().id(), first.snapshot_id);
        assert_eq!(manager.store().load().await.unwrap().id(), first.snapshot_id);
    }

    #[tokio::test]
    async fn test_failed_embedding_publishes_nothing() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Arc::new(FailingEmbedder));

        assert!(matches!(
            manager.rebuild("https://kb/electronics").await,
            Err(KnowledgeError::Embedding(_))
        ));
        assert!(manager.live().current().await.is_none());
        assert!(!dir.path().join("index").exists());
    }

    #[tokio::test]
    async fn test_abandoned_rebuild_still_commits() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Arc::new(SlowEmbedder(VocabularyEmbedder::electronics())));
        let first = manager.rebuild("https://kb/mars").await.unwrap();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(30),
            manager.rebuild("https://kb/electronics"),
        )
        .await;
        assert!(abandoned.is_err());

        // Waits for the commit still holding the rebuild lock.
        let restored = manager.restore().await.unwrap();
        assert_ne!(restored.id(), first.snapshot_id);
        assert_eq!(restored.chunks()[0].text, "Electronic devices process electrical");
        assert_eq!(manager.live().current().await.unwrap().id(), restored.id());

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("index")]);
    }

    #[tokio::test]
    async fn test_restore_after_restart() {
        let dir = TempDir::new().unwrap();
        let built = manager(&dir, Arc::new(VocabularyEmbedder::electronics()))
            .rebuild("https://kb/electronics")
            .await
            .unwrap();

        let restarted = manager(&dir, Arc::new(VocabularyEmbedder::electronics()));
        let restored = restarted.restore().await.unwrap();

        assert_eq!(restored.id(), built.snapshot_id);
        assert_eq!(restarted.live().current().await.unwrap().id(), built.snapshot_id);
    }

    #[tokio::test]
    async fn test_clear_forgets_everything() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Arc::new(VocabularyEmbedder::electronics()));
        manager.rebuild("https://kb/electronics").await.unwrap();

        manager.clear().await.unwrap();

        assert!(manager.live().current().await.is_none());
        assert!(manager.restore().await.is_none());
    }
}
