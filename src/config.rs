//! Pipeline configuration.
//!
//! All options are environment-sourced with deployment defaults; a missing
//! variable is never fatal. Validation runs once, before any component is
//! constructed — invalid chunk/overlap combinations and zero-sized limits
//! abort process start instead of surfacing per request.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{RagError, Result};
use crate::llm::RetryPolicy;

/// Configuration parameters for the answering pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Identifier of the embedding model.
    pub embedding_model: String,
    /// Identifier of the cross-encoder rerank model.
    pub reranker_model: String,
    /// Base URL of the rerank endpoint.
    pub reranker_url: String,
    /// Base URL of the OpenAI-compatible LLM endpoint.
    pub llm_base_url: String,
    /// API key for the LLM endpoint. Empty for local servers.
    pub llm_api_key: String,
    /// Model name requested from the LLM endpoint.
    pub llm_model: String,
    /// Directory holding the vector store snapshots.
    pub store_path: PathBuf,
    /// Name of the vector collection, stable per deployment.
    pub collection_name: String,
    /// Maximum chunk size in bytes.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in bytes.
    pub chunk_overlap: usize,
    /// Number of candidates fetched from vector search.
    pub top_k: usize,
    /// Number of candidates kept after reranking.
    pub rerank_top_k: usize,
    /// Concurrent chat requests admitted by the pipeline.
    pub max_concurrent_requests: usize,
    /// Startup connectivity attempts against the LLM backend.
    pub connect_attempts: u32,
    /// Fixed delay between startup connectivity attempts.
    pub connect_backoff: Duration,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedding_model: "intfloat/multilingual-e5-small".into(),
            reranker_model: "cross-encoder/ms-marco-MiniLM-L-6-v2".into(),
            reranker_url: "http://127.0.0.1:8081/v1".into(),
            llm_base_url: "http://127.0.0.1:1234/v1".into(),
            llm_api_key: String::new(),
            llm_model: "local-model".into(),
            store_path: PathBuf::from("./vector_store"),
            collection_name: "tech_support_docs".into(),
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 3,
            rerank_top_k: 2,
            max_concurrent_requests: 10,
            connect_attempts: 5,
            connect_backoff: Duration::from_secs(3),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "unparsable value, using default");
            default
        }),
        Err(_) => default,
    }
}

impl RagConfig {
    /// Load configuration from `RAG_*` environment variables, falling back
    /// to deployment defaults, then validate.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] when the resulting values are invalid;
    /// this is a fatal startup error.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            embedding_model: env_string("RAG_EMBEDDING_MODEL", &defaults.embedding_model),
            reranker_model: env_string("RAG_RERANKER_MODEL", &defaults.reranker_model),
            reranker_url: env_string("RAG_RERANKER_URL", &defaults.reranker_url),
            llm_base_url: env_string("RAG_LLM_BASE_URL", &defaults.llm_base_url),
            llm_api_key: env_string("RAG_LLM_API_KEY", &defaults.llm_api_key),
            llm_model: env_string("RAG_LLM_MODEL", &defaults.llm_model),
            store_path: PathBuf::from(env_string(
                "RAG_STORE_PATH",
                &defaults.store_path.display().to_string(),
            )),
            collection_name: env_string("RAG_COLLECTION_NAME", &defaults.collection_name),
            chunk_size: env_parse("RAG_CHUNK_SIZE", defaults.chunk_size),
            chunk_overlap: env_parse("RAG_CHUNK_OVERLAP", defaults.chunk_overlap),
            top_k: env_parse("RAG_TOP_K", defaults.top_k),
            rerank_top_k: env_parse("RAG_RERANK_TOP_K", defaults.rerank_top_k),
            max_concurrent_requests: env_parse(
                "RAG_MAX_CONCURRENT_REQUESTS",
                defaults.max_concurrent_requests,
            ),
            connect_attempts: defaults.connect_attempts,
            connect_backoff: defaults.connect_backoff,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate parameter consistency.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0` or `rerank_top_k == 0`
    /// - `max_concurrent_requests == 0`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".into()));
        }
        if self.rerank_top_k == 0 {
            return Err(RagError::Config("rerank_top_k must be greater than zero".into()));
        }
        if self.max_concurrent_requests == 0 {
            return Err(RagError::Config(
                "max_concurrent_requests must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// The startup retry policy for the LLM connectivity check.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy { attempts: self.connect_attempts, backoff: self.connect_backoff }
    }
}
