mod memory;
mod sqlite;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{Conversation, ConversationType, Message};

pub use memory::{MemoryConversationRepository, MemoryMessageRepository};
pub use sqlite::{SqliteConversationRepository, SqliteMessageRepository};

/// Returned by `ConversationRepository::insert` when the two members already
/// share an individual conversation.
#[derive(Debug, Error)]
#[error("conversation already existed")]
pub struct ConversationExists;

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Conversation>>;

    /// Conversations containing every one of `user_ids`, most recently
    /// updated first.
    async fn find_by_members(
        &self,
        user_ids: &[Uuid],
        kind: Option<ConversationType>,
    ) -> anyhow::Result<Vec<Conversation>>;

    /// Fails with [`ConversationExists`] for a second individual conversation
    /// between the same pair.
    async fn insert(&self, conversation: &Conversation) -> anyhow::Result<()>;
}

/// Append-only from the send path.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, message: &Message) -> anyhow::Result<()>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Message>>;

    /// Newest first.
    async fn find_by_conversation(&self, conversation_id: Uuid, limit: u32) -> anyhow::Result<Vec<Message>>;
}

pub(crate) fn contains_all(conversation: &Conversation, user_ids: &[Uuid]) -> bool {
    user_ids.iter().all(|&user_id| conversation.is_member(user_id))
}
