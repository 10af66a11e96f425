//! # support-rag
//!
//! Retrieval-augmented question answering over a corpus of uploaded
//! documents. Questions are answered only from knowledge retrieved from the
//! corpus: document text is chunked, embedded, and stored in a vector
//! index; each user message is embedded, matched against the index,
//! optionally reranked, and the selected passages ground an LLM-generated
//! answer with cited sources.
//!
//! ## Overview
//!
//! - [`SentenceChunker`] — bounded, overlapping, sentence-aligned chunks
//! - [`EmbeddingProvider`] / [`OpenAiEmbeddingProvider`] — normalized text embeddings
//! - [`VectorStore`] / [`LocalVectorStore`] — persistent cosine-similarity index
//! - [`Reranker`] / [`HttpReranker`] — second-pass relevance scoring with graceful degradation
//! - [`ConversationStore`] — capped per-conversation turn history
//! - [`RagPipeline`] — the per-message orchestration state machine
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use support_rag::{
//!     ChatRequest, EncodingConvention, LocalVectorStore, OpenAiChatModel,
//!     OpenAiEmbeddingProvider, RagConfig, RagPipeline,
//! };
//!
//! let config = RagConfig::from_env()?;
//! let embedder = Arc::new(
//!     OpenAiEmbeddingProvider::connect(
//!         &config.llm_base_url,
//!         &config.llm_api_key,
//!         &config.embedding_model,
//!         EncodingConvention::Asymmetric,
//!     )
//!     .await?,
//! );
//! let store = Arc::new(
//!     LocalVectorStore::open(&config.store_path, &config.collection_name, embedder.dimensions())
//!         .await?,
//! );
//! let llm = Arc::new(
//!     OpenAiChatModel::connect(
//!         &config.llm_base_url,
//!         &config.llm_api_key,
//!         &config.llm_model,
//!         config.retry_policy(),
//!     )
//!     .await?,
//! );
//!
//! let pipeline = RagPipeline::builder()
//!     .config(config)
//!     .embedder(embedder)
//!     .store(store)
//!     .llm(llm)
//!     .build()?;
//!
//! pipeline.ingest("hours.txt", "Support is available 9am-6pm.").await?;
//! let response = pipeline.chat(ChatRequest::new("When is support available?")).await;
//! println!("{}", response.response);
//! ```

pub mod chunking;
pub mod config;
pub mod conversation;
pub mod document;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod openai;
pub mod pipeline;
pub mod reranker;
pub mod store;
pub mod vectorstore;

pub use chunking::{Chunker, SentenceChunker};
pub use config::RagConfig;
pub use conversation::{ConversationStore, InMemoryConversationStore, MAX_TURNS};
pub use document::{
    ChatRequest, ChatResponse, Chunk, ChunkInput, ConversationTurn, RerankedResult, Role,
    SearchResult,
};
pub use embedding::{EmbeddingProvider, EncodingConvention};
pub use error::{RagError, Result};
pub use llm::{ChatMessage, ChatModel, OpenAiChatModel, RetryPolicy};
pub use openai::OpenAiEmbeddingProvider;
pub use pipeline::{FALLBACK_ANSWER, NO_KNOWLEDGE_ANSWER, RagPipeline, RagPipelineBuilder};
pub use reranker::{HttpReranker, NEUTRAL_RELEVANCE, PassthroughReranker, Reranker};
pub use store::LocalVectorStore;
pub use vectorstore::{MAX_TOP_K, VectorStore};
