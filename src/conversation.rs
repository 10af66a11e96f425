//! Keyed, size-bounded conversation history.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::document::ConversationTurn;

/// Maximum number of turns kept per conversation. Appending past the cap
/// drops the oldest turns first.
pub const MAX_TURNS: usize = 10;

/// Keyed storage of per-conversation turn history.
///
/// Conversation ids are opaque strings. Appends to the same id serialize so
/// turns accumulate rather than overwrite; operations on different ids do
/// not block each other. Conversations are created lazily on first append.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The turns of a conversation, oldest first. Empty if the id is unseen.
    async fn get(&self, conversation_id: &str) -> Vec<ConversationTurn>;

    /// Append one user turn and the assistant's reply, then trim to the
    /// [`MAX_TURNS`] most recent turns.
    async fn append(
        &self,
        conversation_id: &str,
        user_turn: ConversationTurn,
        assistant_turn: ConversationTurn,
    );

    /// Mint a fresh conversation id for a caller that supplied none.
    fn next_id(&self) -> String;
}

type History = Arc<Mutex<Vec<ConversationTurn>>>;

/// A volatile [`ConversationStore`] backed by a concurrent map.
///
/// Each conversation has its own mutex, so same-id appends serialize while
/// other conversations proceed; the outer map lock is held only long enough
/// to fetch or create an entry. History lives for the process lifetime; a
/// durable keyed store can be substituted behind the same trait.
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<String, History>>,
}

impl InMemoryConversationStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, conversation_id: &str) -> History {
        {
            let conversations = self.conversations.read().await;
            if let Some(history) = conversations.get(conversation_id) {
                return Arc::clone(history);
            }
        }
        let mut conversations = self.conversations.write().await;
        Arc::clone(conversations.entry(conversation_id.to_string()).or_default())
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, conversation_id: &str) -> Vec<ConversationTurn> {
        let history = {
            let conversations = self.conversations.read().await;
            conversations.get(conversation_id).cloned()
        };
        match history {
            Some(history) => history.lock().await.clone(),
            None => Vec::new(),
        }
    }

    async fn append(
        &self,
        conversation_id: &str,
        user_turn: ConversationTurn,
        assistant_turn: ConversationTurn,
    ) {
        let history = self.entry(conversation_id).await;
        let mut turns = history.lock().await;
        turns.push(user_turn);
        turns.push(assistant_turn);
        if turns.len() > MAX_TURNS {
            let excess = turns.len() - MAX_TURNS;
            turns.drain(..excess);
        }
        debug!(conversation_id, turns = turns.len(), "appended conversation turns");
    }

    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
