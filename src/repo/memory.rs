use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ConversationExists, ConversationRepository, MessageRepository, contains_all};
use crate::db::{Conversation, ConversationType, Message};

#[derive(Default)]
pub struct MemoryConversationRepository {
    conversations: RwLock<HashMap<Uuid, Conversation>>,
}

#[async_trait]
impl ConversationRepository for MemoryConversationRepository {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Conversation>> {
        Ok(self.conversations.read().await.get(&id).cloned())
    }

    async fn find_by_members(
        &self,
        user_ids: &[Uuid],
        kind: Option<ConversationType>,
    ) -> anyhow::Result<Vec<Conversation>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut found: Vec<Conversation> = self
            .conversations
            .read()
            .await
            .values()
            .filter(|c| kind.is_none_or(|kind| c.kind == kind))
            .filter(|c| contains_all(c, user_ids))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(found)
    }

    async fn insert(&self, conversation: &Conversation) -> anyhow::Result<()> {
        let mut conversations = self.conversations.write().await;
        if conversations.contains_key(&conversation.id) {
            anyhow::bail!("conversation {} already exists", conversation.id);
        }
        if let Some(key) = conversation.pair_key() {
            if conversations.values().any(|c| c.pair_key().as_ref() == Some(&key)) {
                return Err(ConversationExists.into());
            }
        }
        conversations.insert(conversation.id, conversation.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryMessageRepository {
    messages: RwLock<Vec<Message>>,
}

#[async_trait]
impl MessageRepository for MemoryMessageRepository {
    async fn insert(&self, message: &Message) -> anyhow::Result<()> {
        let mut messages = self.messages.write().await;
        if messages.iter().any(|m| m.id == message.id) {
            anyhow::bail!("message {} already exists", message.id);
        }
        messages.push(message.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Message>> {
        Ok(self.messages.read().await.iter().find(|m| m.id == id).cloned())
    }

    async fn find_by_conversation(&self, conversation_id: Uuid, limit: u32) -> anyhow::Result<Vec<Message>> {
        Ok(self
            .messages
            .read()
            .await
            .iter()
            .rev()
            .filter(|m| m.conversation_id == conversation_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn second_individual_conversation_for_a_pair_is_refused() {
        let repo = MemoryConversationRepository::default();
        let (me, friend) = (Uuid::now_v7(), Uuid::now_v7());

        repo.insert(&Conversation::individual(me, friend)).await.unwrap();
        let err = repo.insert(&Conversation::individual(friend, me)).await.unwrap_err();

        assert!(err.is::<ConversationExists>());
        assert_eq!(repo.find_by_members(&[me, friend], None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn racing_creates_store_one_conversation() {
        let repo = Arc::new(MemoryConversationRepository::default());
        let (me, friend) = (Uuid::now_v7(), Uuid::now_v7());

        let mut tasks = tokio::task::JoinSet::new();
        for n in 0..8 {
            let repo = repo.clone();
            tasks.spawn(async move {
                let conversation = if n % 2 == 0 {
                    Conversation::individual(me, friend)
                } else {
                    Conversation::individual(friend, me)
                };
                repo.insert(&conversation).await.is_ok()
            });
        }

        let mut created = 0;
        while let Some(ok) = tasks.join_next().await {
            if ok.unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }
}
