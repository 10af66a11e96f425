//! Answering pipeline orchestrator.
//!
//! [`RagPipeline`] coordinates ingestion (chunk → embed → store) and the
//! per-message answer flow: retrieve → rerank → assemble context →
//! generate → update history → respond. Every chat request produces a
//! user-visible response; backend failures degrade to canned answers and
//! are never propagated raw.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::chunking::{Chunker, SentenceChunker};
use crate::config::RagConfig;
use crate::conversation::{ConversationStore, InMemoryConversationStore};
use crate::document::{ChatRequest, ChatResponse, ChunkInput, ConversationTurn, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::{ChatMessage, ChatModel};
use crate::reranker::{PassthroughReranker, Reranker};
use crate::vectorstore::VectorStore;

/// The answer given when the index holds nothing relevant to retrieve.
pub const NO_KNOWLEDGE_ANSWER: &str =
    "I'm sorry, my knowledge base does not contain any information to answer that question.";

/// The answer substituted when a backend fails at request time.
pub const FALLBACK_ANSWER: &str =
    "I'm sorry, something went wrong while answering your question. Please try again.";

/// Maximum number of source previews returned with an answer.
const MAX_SOURCES: usize = 3;

/// Maximum length of one source preview, in bytes.
const PREVIEW_LEN: usize = 100;

const SUGGESTED_QUESTIONS: [&str; 3] = [
    "What documents can be uploaded?",
    "How does document search work?",
    "Which file formats are supported?",
];

const SYSTEM_INSTRUCTION: &str = "You are a support assistant answering from a document \
     knowledge base. Answer using only the numbered context documents provided in the user's \
     message. If the context does not contain the information needed, say that you do not know.";

/// The pipeline orchestrator.
///
/// Composes an [`EmbeddingProvider`], a [`VectorStore`], a [`Chunker`], a
/// [`Reranker`], a [`ChatModel`], and a [`ConversationStore`]. All
/// collaborators are constructed explicitly at process start and passed in
/// via [`RagPipeline::builder()`]; there are no hidden shared statics.
pub struct RagPipeline {
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    reranker: Arc<dyn Reranker>,
    llm: Arc<dyn ChatModel>,
    conversations: Arc<dyn ConversationStore>,
    permits: Semaphore,
}

impl fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RagPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Ingest one document's extracted text: chunk → embed → store.
    ///
    /// Chunk texts are stored verbatim; the embedding side sees them tagged
    /// per the embedder's query/passage convention. Returns the ids of the
    /// stored chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Ingestion`] when no usable text survives
    /// chunking, or propagates embedding/store failures.
    pub async fn ingest(&self, source_document: &str, text: &str) -> Result<Vec<String>> {
        let chunks: Vec<String> =
            self.chunker.split(text).into_iter().filter(|c| !c.is_empty()).collect();
        if chunks.is_empty() {
            return Err(RagError::Ingestion {
                source_document: source_document.to_string(),
                message: "no text extracted".into(),
            });
        }

        let convention = self.embedder.convention();
        let tagged: Vec<String> = chunks.iter().map(|c| convention.tag_passage(c)).collect();
        let tagged_refs: Vec<&str> = tagged.iter().map(String::as_str).collect();
        let embeddings = self.embedder.embed_batch(&tagged_refs).await?;

        let total_chunks = chunks.len();
        let inputs: Vec<ChunkInput> = chunks
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| ChunkInput {
                text,
                source_document: source_document.to_string(),
                chunk_index,
                total_chunks,
            })
            .collect();

        let ids = self.store.add(&inputs, &embeddings).await?;
        info!(source_document, chunk_count = ids.len(), "ingested document");
        Ok(ids)
    }

    /// Ingest a batch of `(filename, text)` pairs.
    ///
    /// A file that fails is logged and skipped; it never aborts processing
    /// of the other files. The per-file outcome is returned in input order.
    pub async fn ingest_batch(
        &self,
        files: &[(String, String)],
    ) -> Vec<(String, Result<Vec<String>>)> {
        let mut outcomes = Vec::with_capacity(files.len());
        for (source_document, text) in files {
            let outcome = self.ingest(source_document, text).await;
            if let Err(e) = &outcome {
                warn!(source_document, error = %e, "skipping file");
            }
            outcomes.push((source_document.clone(), outcome));
        }
        outcomes
    }

    /// Answer one user message.
    ///
    /// Drives retrieval, optional reranking, context assembly, generation,
    /// and the history update. Infallible at this boundary: any
    /// unrecoverable step still yields a response carrying an explanatory
    /// message, and the exchange is recorded in the conversation history.
    pub async fn chat(&self, request: ChatRequest) -> ChatResponse {
        // The semaphore is never closed; acquire cannot fail in practice.
        let _permit = self.permits.acquire().await.ok();

        let conversation_id = request
            .conversation_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.conversations.next_id());
        let history = self.conversations.get(&conversation_id).await;

        let (response, sources) = match self.answer(&request, &history).await {
            Ok(answered) => answered,
            Err(e) => {
                error!(conversation_id, error = %e, "answer flow failed");
                (FALLBACK_ANSWER.to_string(), Vec::new())
            }
        };

        self.conversations
            .append(
                &conversation_id,
                ConversationTurn::user(&request.message),
                ConversationTurn::assistant(&response),
            )
            .await;

        ChatResponse {
            response,
            conversation_id,
            sources,
            suggested_questions: SUGGESTED_QUESTIONS.iter().map(|q| q.to_string()).collect(),
        }
    }

    /// Retrieval through generation; errors here become the fallback answer.
    async fn answer(
        &self,
        request: &ChatRequest,
        history: &[ConversationTurn],
    ) -> Result<(String, Vec<String>)> {
        let tagged_query = self.embedder.convention().tag_query(&request.message);
        let query_embedding = self.embedder.embed(&tagged_query).await?;

        let results = self.store.search(&query_embedding, self.config.top_k).await?;
        if results.is_empty() {
            info!("index empty or no candidates, answering without knowledge");
            return Ok((NO_KNOWLEDGE_ANSWER.to_string(), Vec::new()));
        }

        let documents: Vec<String> = results.iter().map(|r| r.chunk.text.clone()).collect();

        // Reranking one document is meaningless; skip below two candidates.
        let context_docs: Vec<String> = if request.use_reranking && documents.len() >= 2 {
            self.reranker
                .rerank(&request.message, &documents, self.config.rerank_top_k)
                .await
                .into_iter()
                .map(|r| r.text)
                .collect()
        } else {
            documents.into_iter().take(self.config.rerank_top_k).collect()
        };

        let messages = assemble_messages(&request.message, &context_docs, history);

        let response = match self.llm.generate(&messages).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "generation failed, substituting fallback");
                FALLBACK_ANSWER.to_string()
            }
        };

        let sources = source_previews(&results);
        Ok((response, sources))
    }
}

/// Build the message list: system instruction, prior turns, then the new
/// user message carrying the labeled context block.
fn assemble_messages(
    question: &str,
    context_docs: &[String],
    history: &[ConversationTurn],
) -> Vec<ChatMessage> {
    let context_block = context_docs
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("[{}] {doc}", i + 1))
        .collect::<Vec<_>>()
        .join("\n\n");

    let user_prompt = format!(
        "Answer the question using the context documents below.\n\n\
         Context documents:\n{context_block}\n\nQuestion: {question}"
    );

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_INSTRUCTION));
    for turn in history {
        messages.push(ChatMessage { role: turn.role, content: turn.content.clone() });
    }
    messages.push(ChatMessage::user(user_prompt));
    messages
}

/// Truncated previews of the best retrieved chunks, at most [`MAX_SOURCES`].
fn source_previews(results: &[SearchResult]) -> Vec<String> {
    results.iter().take(MAX_SOURCES).map(|r| preview(&r.chunk.text)).collect()
}

/// At most [`PREVIEW_LEN`] bytes of `text`, cut on a char boundary, with an
/// ellipsis when truncated.
fn preview(text: &str) -> String {
    if text.len() <= PREVIEW_LEN {
        return text.to_string();
    }
    let mut end = PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedder`, `store`, and `llm` are required. The chunker
/// defaults to a [`SentenceChunker`] sized from the config, the reranker to
/// [`PassthroughReranker`], and the conversation store to a fresh
/// [`InMemoryConversationStore`].
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    reranker: Option<Arc<dyn Reranker>>,
    llm: Option<Arc<dyn ChatModel>>,
    conversations: Option<Arc<dyn ConversationStore>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the vector store backend.
    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the candidate reranker.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Set the chat model used for answer generation.
    pub fn llm(mut self, llm: Arc<dyn ChatModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Set the conversation history store.
    pub fn conversations(mut self, conversations: Arc<dyn ConversationStore>) -> Self {
        self.conversations = Some(conversations);
        self
    }

    /// Build the [`RagPipeline`], validating the configuration and the
    /// required collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the configuration is invalid or a
    /// required collaborator is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::Config("config is required".to_string()))?;
        config.validate()?;

        let embedder =
            self.embedder.ok_or_else(|| RagError::Config("embedder is required".to_string()))?;
        let store =
            self.store.ok_or_else(|| RagError::Config("store is required".to_string()))?;
        let llm = self.llm.ok_or_else(|| RagError::Config("llm is required".to_string()))?;

        let chunker = self
            .chunker
            .unwrap_or_else(|| Arc::new(SentenceChunker::new(config.chunk_size, config.chunk_overlap)));
        let reranker = self.reranker.unwrap_or_else(|| Arc::new(PassthroughReranker));
        let conversations =
            self.conversations.unwrap_or_else(|| Arc::new(InMemoryConversationStore::new()));

        let permits = Semaphore::new(config.max_concurrent_requests);

        Ok(RagPipeline { config, embedder, store, chunker, reranker, llm, conversations, permits })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;

    #[test]
    fn preview_truncates_with_ellipsis() {
        let long = "x".repeat(150);
        let cut = preview(&long);
        assert_eq!(cut.len(), PREVIEW_LEN + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let long = "я".repeat(120);
        let cut = preview(&long);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= PREVIEW_LEN + 3);
    }

    #[test]
    fn context_block_is_numbered_and_history_is_preserved() {
        let history =
            vec![ConversationTurn::user("earlier"), ConversationTurn::assistant("reply")];
        let docs = vec!["first doc".to_string(), "second doc".to_string()];
        let messages = assemble_messages("what now?", &docs, &history);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, crate::document::Role::System);
        assert_eq!(messages[1].content, "earlier");
        assert_eq!(messages[2].content, "reply");
        let prompt = &messages[3].content;
        assert!(prompt.contains("[1] first doc"));
        assert!(prompt.contains("[2] second doc"));
        assert!(prompt.contains("Question: what now?"));
    }

    #[test]
    fn source_previews_cap_at_three() {
        let results: Vec<SearchResult> = (0..5)
            .map(|i| SearchResult {
                chunk: Chunk {
                    id: i.to_string(),
                    text: format!("chunk {i}"),
                    source_document: "doc.txt".into(),
                    chunk_index: i,
                    total_chunks: 5,
                },
                distance: 0.1,
                score: 0.9,
            })
            .collect();
        assert_eq!(source_previews(&results).len(), 3);
    }

    #[test]
    fn builder_requires_collaborators() {
        let err = RagPipeline::builder().config(RagConfig::default()).build().unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }
}
