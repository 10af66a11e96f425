//! Error types for the `support-rag` crate.

use thiserror::Error;

/// Errors that can occur across the retrieval-augmented answering pipeline.
///
/// The taxonomy separates fatal startup failures ([`Config`](RagError::Config))
/// from conditions that are recoverable at request time. Backend connectivity
/// problems are never shown to an end user as-is; the pipeline converts them
/// into a fallback answer.
#[derive(Debug, Error)]
pub enum RagError {
    /// A configuration validation error. Fatal; aborts process start.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A backend (embedding endpoint, LLM, reranker) is unreachable.
    #[error("Connectivity error ({backend}): {message}")]
    Connectivity {
        /// The backend that could not be reached.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A single file failed to ingest. Skipped in batch ingestion,
    /// never aborts the other files.
    #[error("Ingestion error ({source_document}): {message}")]
    Ingestion {
        /// The document the failure relates to.
        source_document: String,
        /// A description of the failure.
        message: String,
    },

    /// An error in the pipeline orchestration.
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

/// A convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
