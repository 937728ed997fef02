//! Persisted snapshot storage.
//!
//! A snapshot lives in one directory:
//!
//! ```text
//! <index_dir>/
//!   manifest.json   model, dimension, chunk count, creation time
//!   vectors.json    chunks with their embeddings
//! ```
//!
//! Replacement is atomic at the directory level. The new snapshot is written
//! to a sibling staging directory, the current directory is renamed aside,
//! staging is renamed into place and only then is the retired directory
//! removed. A failure at any step leaves the previous snapshot in place.
//!
//! If the process dies between the two renames, the next [`IndexStore::load`]
//! moves the retired snapshot back and sweeps leftover siblings.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use kbqa_embeddings::{EmbeddingError, EmbeddingProvider, EmbeddingRequest};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::chunker::Chunk;
use crate::error::{KnowledgeError, Result};
use crate::snapshot::{IndexedVector, ScoredChunk, Snapshot, SnapshotManifest};

const MANIFEST_FILE: &str = "manifest.json";
const VECTORS_FILE: &str = "vectors.json";

/// Builds, persists and reloads snapshots under one directory.
pub struct IndexStore {
    root: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            root: root.into(),
            embedder,
        }
    }

    /// Directory holding the current snapshot.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Model id of the embedding provider snapshots are built with.
    pub fn embedding_model(&self) -> &str {
        self.embedder.model_id()
    }

    /// Embed `chunks` and persist them as the new current snapshot.
    ///
    /// Nothing is written if embedding fails.
    pub async fn build(&self, chunks: Vec<Chunk>) -> Result<Snapshot> {
        if chunks.is_empty() {
            return Err(KnowledgeError::EmptySource);
        }

        let requests = chunks
            .iter()
            .map(|chunk| EmbeddingRequest::document(chunk.text.clone()))
            .collect();
        let responses = self.embedder.embed_batch(requests).await?;

        if responses.len() != chunks.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                responses.len()
            ))
            .into());
        }
        if let Some(stray) = responses
            .iter()
            .find(|response| response.model != responses[0].model)
        {
            return Err(EmbeddingError::ModelMismatch {
                expected: responses[0].model.clone(),
                actual: stray.model.clone(),
            }
            .into());
        }

        let vectors = chunks
            .into_iter()
            .zip(responses)
            .map(|(chunk, response)| IndexedVector {
                chunk,
                embedding: response.embedding,
            })
            .collect();
        let snapshot = Snapshot::new(self.embedder.model_id(), vectors)?;

        self.persist(&snapshot).await?;
        info!(
            "Built snapshot {} with {} chunks at {}",
            snapshot.id(),
            snapshot.len(),
            self.root.display()
        );
        Ok(snapshot)
    }

    /// Load the persisted snapshot, if there is a usable one.
    ///
    /// Missing, empty, corrupt or foreign-model directories all yield `None`.
    /// Must not run concurrently with [`Self::build`] on the same directory.
    pub async fn load(&self) -> Option<Snapshot> {
        if let Err(e) = self.recover().await {
            warn!("Could not tidy up around {}: {e}", self.root.display());
        }
        match self.try_load().await {
            Ok(Some(snapshot)) => {
                info!(
                    "Loaded snapshot {} ({} chunks) from {}",
                    snapshot.id(),
                    snapshot.len(),
                    self.root.display()
                );
                Some(snapshot)
            }
            Ok(None) => {
                info!("No knowledge base at {}", self.root.display());
                None
            }
            Err(e) => {
                warn!("Ignoring unusable snapshot at {}: {e}", self.root.display());
                None
            }
        }
    }

    async fn try_load(&self) -> Result<Option<Snapshot>> {
        let manifest_path = self.root.join(MANIFEST_FILE);
        if !fs::try_exists(&manifest_path).await? {
            return Ok(None);
        }

        let manifest: SnapshotManifest =
            serde_json::from_slice(&fs::read(&manifest_path).await?)?;
        if manifest.embedding_model != self.embedder.model_id() {
            return Err(EmbeddingError::ModelMismatch {
                expected: self.embedder.model_id().to_string(),
                actual: manifest.embedding_model,
            }
            .into());
        }

        let vectors: Vec<IndexedVector> =
            serde_json::from_slice(&fs::read(self.root.join(VECTORS_FILE)).await?)?;
        Snapshot::restore(manifest, vectors).map(Some)
    }

    /// Finish an interrupted replacement.
    ///
    /// When the index directory is missing, the newest retired snapshot with
    /// a manifest is moved back into place. Every other staging or retired
    /// sibling is removed.
    async fn recover(&self) -> Result<()> {
        let Some(parent) = self.root.parent() else {
            return Ok(());
        };
        if !fs::try_exists(parent).await? {
            return Ok(());
        }
        let staging_prefix = self.sibling_prefix("staging")?;
        let retired_prefix = self.sibling_prefix("retired")?;

        let mut staging = Vec::new();
        let mut retired = Vec::new();
        let mut entries = fs::read_dir(parent).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(&staging_prefix) {
                staging.push(entry.path());
            } else if name.starts_with(&retired_prefix) {
                retired.push(entry.path());
            }
        }

        if !fs::try_exists(&self.root).await? {
            let mut newest: Option<(SystemTime, PathBuf)> = None;
            for path in &retired {
                let Ok(metadata) = fs::metadata(path.join(MANIFEST_FILE)).await else {
                    continue;
                };
                let modified = metadata.modified()?;
                if newest.as_ref().is_none_or(|(time, _)| modified > *time) {
                    newest = Some((modified, path.clone()));
                }
            }
            if let Some((_, path)) = newest {
                fs::rename(&path, &self.root).await?;
                warn!(
                    "Recovered snapshot from interrupted replacement {}",
                    path.display()
                );
                retired.retain(|other| other != &path);
            }
        }

        for path in staging.into_iter().chain(retired) {
            debug!("Removing leftover {}", path.display());
            if let Err(e) = fs::remove_dir_all(&path).await {
                warn!("Failed to remove {}: {e}", path.display());
            }
        }
        Ok(())
    }

    /// Remove the persisted snapshot, if any.
    pub async fn clear(&self) -> Result<()> {
        if fs::try_exists(&self.root).await? {
            fs::remove_dir_all(&self.root).await?;
            info!("Cleared knowledge base at {}", self.root.display());
        }
        Ok(())
    }

    /// The `k` chunks of `snapshot` most similar to `query`.
    ///
    /// Without a snapshot there is nothing to find.
    pub fn search(
        snapshot: Option<&Snapshot>,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        match snapshot {
            Some(snapshot) => snapshot.search(query, k),
            None => Ok(Vec::new()),
        }
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let staging = self.sibling("staging", snapshot.id())?;
        let retired = self.sibling("retired", snapshot.id())?;

        if let Some(parent) = self.root.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = write_snapshot(&staging, snapshot).await {
            let _ = fs::remove_dir_all(&staging).await;
            return Err(e);
        }

        let had_previous = fs::try_exists(&self.root).await?;
        if had_previous {
            if let Err(e) = fs::rename(&self.root, &retired).await {
                let _ = fs::remove_dir_all(&staging).await;
                return Err(e.into());
            }
        }

        if let Err(e) = fs::rename(&staging, &self.root).await {
            if had_previous {
                if let Err(restore) = fs::rename(&retired, &self.root).await {
                    warn!(
                        "Could not restore previous snapshot from {}: {restore}",
                        retired.display()
                    );
                }
            }
            let _ = fs::remove_dir_all(&staging).await;
            return Err(e.into());
        }

        if had_previous {
            if let Err(e) = fs::remove_dir_all(&retired).await {
                warn!("Failed to remove retired snapshot {}: {e}", retired.display());
            }
        }

        debug!("Committed snapshot {} to {}", snapshot.id(), self.root.display());
        Ok(())
    }

    fn sibling(&self, role: &str, id: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .with_file_name(format!("{}{id}", self.sibling_prefix(role)?)))
    }

    fn sibling_prefix(&self, role: &str) -> Result<String> {
        let name = self
            .root
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                KnowledgeError::Config(format!(
                    "index directory {} has no usable name",
                    self.root.display()
                ))
            })?;
        Ok(format!(".{name}.{role}-"))
    }
}

async fn write_snapshot(dir: &Path, snapshot: &Snapshot) -> Result<()> {
    fs::create_dir_all(dir).await?;
    fs::write(
        dir.join(VECTORS_FILE),
        serde_json::to_vec(&snapshot.indexed_vectors())?,
    )
    .await?;
    // Manifest last: a directory without one is never loaded.
    fs::write(
        dir.join(MANIFEST_FILE),
        serde_json::to_vec_pretty(snapshot.manifest())?,
    )
    .await?;
    Ok(())
}
