//! Data types for chunks, search results, and conversation turns.

use serde::{Deserialize, Serialize};

/// A bounded segment of a source document, the unit of retrieval.
///
/// Chunks are created by the chunker during ingestion and are immutable once
/// stored. The `id` is assigned by the vector store at insertion time and is
/// never reused.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier, assigned at insertion.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The filename the chunk was extracted from.
    pub source_document: String,
    /// Position of this chunk within its document, starting at 0.
    pub chunk_index: usize,
    /// Total number of chunks produced from the document.
    pub total_chunks: usize,
}

/// A chunk as submitted for indexing, before an id exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkInput {
    /// The text content of the chunk.
    pub text: String,
    /// The filename the chunk was extracted from.
    pub source_document: String,
    /// Position of this chunk within its document, starting at 0.
    pub chunk_index: usize,
    /// Total number of chunks produced from the document.
    pub total_chunks: usize,
}

/// A retrieved [`Chunk`] with its cosine distance to the query.
///
/// `score` is `1.0 - distance`, so higher means more similar. Under cosine
/// distance the score is bounded near `[-1, 1]`; callers must only rely on
/// the ordering, not on the bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine distance between the query and the chunk embedding (>= 0).
    pub distance: f32,
    /// Similarity score, `1.0 - distance`. Higher is more relevant.
    pub score: f32,
}

/// A document re-scored by the reranker.
///
/// `relevance` has no fixed scale; it is only comparable to other results
/// of the same `rerank` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankedResult {
    /// The document text.
    pub text: String,
    /// Pairwise relevance against the query, descending within one call.
    pub relevance: f32,
}

/// The author of a chat message or conversation turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction. Never stored in conversation history.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
}

/// One message exchange unit in a dialogue history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    /// Either [`Role::User`] or [`Role::Assistant`].
    pub role: Role,
    /// The message text.
    pub content: String,
}

impl ConversationTurn {
    /// A user turn with the given content.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// An assistant turn with the given content.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// An incoming chat request at the pipeline boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
    /// An existing conversation id, or `None` to start a fresh conversation.
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Whether to rerank retrieved candidates. Defaults to `true`.
    #[serde(default = "default_use_reranking")]
    pub use_reranking: bool,
}

fn default_use_reranking() -> bool {
    true
}

impl ChatRequest {
    /// A request with reranking enabled and no prior conversation.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), conversation_id: None, use_reranking: true }
    }
}

/// The pipeline's answer to one chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The answer text.
    pub response: String,
    /// The conversation id, minted if the request carried none.
    pub conversation_id: String,
    /// Truncated previews of the retrieved source chunks, at most 3.
    pub sources: Vec<String>,
    /// Follow-up questions offered to the user.
    pub suggested_questions: Vec<String>,
}
