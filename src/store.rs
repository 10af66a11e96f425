//! Local vector store with cosine similarity search and JSON snapshot
//! persistence.
//!
//! [`LocalVectorStore`] keeps all chunks in a `HashMap` behind a
//! `tokio::sync::RwLock`, so concurrent searches share the read lock while
//! append-only adds take the write lock. When opened with a snapshot path,
//! every add rewrites the collection's JSON snapshot so the index survives
//! process restarts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::document::{Chunk, ChunkInput, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{MAX_TOP_K, VectorStore};

/// The only similarity metric this store supports. Recorded in the snapshot
/// header; reopening a collection under a different metric is unsupported.
const METRIC: &str = "cosine";

/// A chunk together with its embedding, as held in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// On-disk layout of one collection snapshot.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    collection: String,
    metric: String,
    dimensions: usize,
    records: Vec<StoredChunk>,
}

/// A vector store over one named collection, optionally persisted as a JSON
/// snapshot at a configured location.
///
/// # Example
///
/// ```rust,ignore
/// use support_rag::{LocalVectorStore, VectorStore};
///
/// let store = LocalVectorStore::open("./vector_store", "tech_support_docs", 384).await?;
/// let ids = store.add(&chunks, &embeddings).await?;
/// let results = store.search(&query_embedding, 3).await?;
/// ```
#[derive(Debug)]
pub struct LocalVectorStore {
    records: RwLock<HashMap<String, StoredChunk>>,
    collection: String,
    dimensions: usize,
    snapshot_path: Option<PathBuf>,
}

impl LocalVectorStore {
    /// Open (or create) the collection persisted under `path`.
    ///
    /// On first use the collection is created with the cosine metric baked
    /// in. An existing snapshot is loaded and validated against `dimensions`
    /// and the metric.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the snapshot was written with a
    /// different metric or dimensionality, or [`RagError::VectorStore`] on
    /// unreadable/corrupt snapshot data.
    pub async fn open(
        path: impl AsRef<Path>,
        collection: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self> {
        let collection = collection.into();
        let dir = path.as_ref();
        let snapshot_path = dir.join(format!("{collection}.json"));

        let records = if snapshot_path.exists() {
            let bytes = tokio::fs::read(&snapshot_path).await.map_err(|e| {
                RagError::VectorStore {
                    backend: "local".into(),
                    message: format!("failed to read snapshot {}: {e}", snapshot_path.display()),
                }
            })?;
            let snapshot: Snapshot =
                serde_json::from_slice(&bytes).map_err(|e| RagError::VectorStore {
                    backend: "local".into(),
                    message: format!("corrupt snapshot {}: {e}", snapshot_path.display()),
                })?;

            if snapshot.metric != METRIC {
                return Err(RagError::Config(format!(
                    "collection '{collection}' was created with metric '{}', expected '{METRIC}'",
                    snapshot.metric
                )));
            }
            if snapshot.dimensions != dimensions {
                return Err(RagError::Config(format!(
                    "collection '{collection}' holds {}-dimensional vectors, embedder produces {dimensions}",
                    snapshot.dimensions
                )));
            }

            info!(collection = %collection, count = snapshot.records.len(), "loaded snapshot");
            snapshot.records.into_iter().map(|r| (r.chunk.id.clone(), r)).collect()
        } else {
            tokio::fs::create_dir_all(dir).await.map_err(|e| RagError::VectorStore {
                backend: "local".into(),
                message: format!("failed to create store directory {}: {e}", dir.display()),
            })?;
            info!(collection = %collection, dimensions, "created new collection");
            HashMap::new()
        };

        Ok(Self {
            records: RwLock::new(records),
            collection,
            dimensions,
            snapshot_path: Some(snapshot_path),
        })
    }

    /// A volatile store with no snapshot, for tests and ephemeral use.
    pub fn in_memory(dimensions: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            collection: "default".into(),
            dimensions,
            snapshot_path: None,
        }
    }

    /// Rewrite the snapshot from the records currently held. Caller must
    /// hold the write lock so adds serialize with their persistence.
    async fn persist(&self, records: &HashMap<String, StoredChunk>) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let snapshot = Snapshot {
            collection: self.collection.clone(),
            metric: METRIC.to_string(),
            dimensions: self.dimensions,
            records: records.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec(&snapshot).map_err(|e| RagError::VectorStore {
            backend: "local".into(),
            message: format!("failed to serialize snapshot: {e}"),
        })?;
        tokio::fs::write(path, bytes).await.map_err(|e| RagError::VectorStore {
            backend: "local".into(),
            message: format!("failed to write snapshot {}: {e}", path.display()),
        })
    }
}

/// Cosine similarity of two vectors, tolerant of non-normalized input.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn add(&self, chunks: &[ChunkInput], embeddings: &[Vec<f32>]) -> Result<Vec<String>> {
        if chunks.len() != embeddings.len() {
            return Err(RagError::VectorStore {
                backend: "local".into(),
                message: format!(
                    "{} chunks but {} embeddings",
                    chunks.len(),
                    embeddings.len()
                ),
            });
        }
        for embedding in embeddings {
            if embedding.len() != self.dimensions {
                return Err(RagError::Config(format!(
                    "embedding has {} dimensions, collection '{}' expects {}",
                    embedding.len(),
                    self.collection,
                    self.dimensions
                )));
            }
        }

        let mut ids = Vec::with_capacity(chunks.len());
        let mut records = self.records.write().await;
        for (input, embedding) in chunks.iter().zip(embeddings) {
            let id = Uuid::new_v4().to_string();
            let chunk = Chunk {
                id: id.clone(),
                text: input.text.clone(),
                source_document: input.source_document.clone(),
                chunk_index: input.chunk_index,
                total_chunks: input.total_chunks,
            };
            records.insert(id.clone(), StoredChunk { chunk, embedding: embedding.clone() });
            ids.push(id);
        }
        self.persist(&records).await?;

        debug!(collection = %self.collection, added = ids.len(), total = records.len(), "added chunks");
        Ok(ids)
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        if embedding.len() != self.dimensions {
            return Err(RagError::Config(format!(
                "query embedding has {} dimensions, collection '{}' expects {}",
                embedding.len(),
                self.collection,
                self.dimensions
            )));
        }
        let records = self.records.read().await;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<SearchResult> = records
            .values()
            .map(|stored| {
                let distance = 1.0 - cosine_similarity(&stored.embedding, embedding);
                SearchResult { chunk: stored.chunk.clone(), distance, score: 1.0 - distance }
            })
            .collect();

        results.sort_by(|a, b| {
            a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k.min(MAX_TOP_K));

        debug!(collection = %self.collection, found = results.len(), "search completed");
        Ok(results)
    }

    async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(text: &str, index: usize, total: usize) -> ChunkInput {
        ChunkInput {
            text: text.to_string(),
            source_document: "manual.txt".to_string(),
            chunk_index: index,
            total_chunks: total,
        }
    }

    #[tokio::test]
    async fn add_rejects_length_mismatch() {
        let store = LocalVectorStore::in_memory(2);
        let err = store
            .add(&[input("a", 0, 2), input("b", 1, 2)], &[vec![1.0, 0.0]])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::VectorStore { .. }));
    }

    #[tokio::test]
    async fn add_rejects_dimension_mismatch() {
        let store = LocalVectorStore::in_memory(2);
        let err = store.add(&[input("a", 0, 1)], &[vec![1.0, 0.0, 0.0]]).await.unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[tokio::test]
    async fn empty_index_search_returns_nothing() {
        let store = LocalVectorStore::in_memory(2);
        let results = store.search(&[1.0, 0.0], 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn search_rejects_wrong_query_dimensions_even_when_empty() {
        let store = LocalVectorStore::in_memory(2);
        let err = store.search(&[1.0, 0.0, 0.0], 5).await.unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[tokio::test]
    async fn search_orders_by_descending_score() {
        let store = LocalVectorStore::in_memory(2);
        store
            .add(
                &[input("east", 0, 3), input("north", 1, 3), input("diagonal", 2, 3)],
                &[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7071, 0.7071]],
            )
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk.text, "east");
        assert_eq!(results[1].chunk.text, "diagonal");
        assert!((results[0].score - 1.0).abs() < 1e-5);
        assert!(results[0].score >= results[1].score);
        assert!(results[1].score >= results[2].score);
        // score and distance are two views of the same quantity
        for r in &results {
            assert!((r.score - (1.0 - r.distance)).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn ids_are_unique_per_insert() {
        let store = LocalVectorStore::in_memory(2);
        let first = store.add(&[input("a", 0, 1)], &[vec![1.0, 0.0]]).await.unwrap();
        let second = store.add(&[input("a", 0, 1)], &[vec![1.0, 0.0]]).await.unwrap();
        assert_ne!(first[0], second[0]);
        assert_eq!(store.count().await, 2);
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalVectorStore::open(dir.path(), "docs", 2).await.unwrap();
            store.add(&[input("persisted", 0, 1)], &[vec![0.0, 1.0]]).await.unwrap();
        }

        let reopened = LocalVectorStore::open(dir.path(), "docs", 2).await.unwrap();
        assert_eq!(reopened.count().await, 1);
        let results = reopened.search(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(results[0].chunk.text, "persisted");
    }

    #[tokio::test]
    async fn reopen_with_other_dimensionality_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalVectorStore::open(dir.path(), "docs", 2).await.unwrap();
            store.add(&[input("persisted", 0, 1)], &[vec![0.0, 1.0]]).await.unwrap();
        }

        let err = LocalVectorStore::open(dir.path(), "docs", 3).await.unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }
}
