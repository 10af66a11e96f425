//! Vector store trait for storing and searching chunk embeddings.

use async_trait::async_trait;

use crate::document::{ChunkInput, SearchResult};
use crate::error::Result;

/// Hard ceiling on `top_k` for any search, bounding the tail latency and
/// memory of result formatting independent of what the caller asked for.
pub const MAX_TOP_K: usize = 20;

/// A storage backend for chunk embeddings with cosine similarity search.
///
/// Implementations own the stored [`Chunk`](crate::Chunk)s: ids are
/// generated at insertion and never reused, and chunks are immutable once
/// stored. Concurrent `add` calls from background ingestion and concurrent
/// `search` calls from live queries must both be safe; `add` is append-only.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Add chunks with their embeddings, returning the freshly generated
    /// chunk ids in input order.
    ///
    /// # Errors
    ///
    /// A `chunks`/`embeddings` length mismatch is a caller error surfaced
    /// immediately, never silently truncated. An embedding whose length
    /// differs from the store's dimensionality is a configuration error.
    async fn add(&self, chunks: &[ChunkInput], embeddings: &[Vec<f32>]) -> Result<Vec<String>>;

    /// Search for the `top_k` most similar chunks, best first.
    ///
    /// `top_k` is clamped to [`MAX_TOP_K`]. An empty index returns an empty
    /// `Vec`; that is "no knowledge available", not a failure.
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;

    /// Number of chunks currently stored.
    async fn count(&self) -> usize;
}
