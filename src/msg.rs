//! Turning an inbound send request into a stored message.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    db::{Conversation, Message, STATUS_DELIVERED},
    error::ChatError,
    events::UserSendMessagePayload,
    repo::{ConversationRepository, MessageRepository},
};

pub fn construct_message(
    sender_id: Uuid,
    conversation_id: Uuid,
    reply_to: Option<Uuid>,
    content: String,
) -> Message {
    let now = OffsetDateTime::now_utc();
    Message {
        id: Uuid::now_v7(),
        conversation_id,
        sender_id,
        reply_to,
        content,
        status: STATUS_DELIVERED.to_owned(),
        emotions: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

fn parse_id(field: &str, raw: &str) -> Result<Uuid, ChatError> {
    Uuid::parse_str(raw).map_err(|_| ChatError::invalid_id(field, raw))
}

/// Validates the request against the conversation and persists the message.
/// Nothing is written unless every check passes.
///
/// `reply_to` only has to be a well formed id. It is not resolved, so it may
/// point at a message that does not exist or lives in another conversation.
pub(crate) async fn accept_message(
    conversations: &dyn ConversationRepository,
    messages: &dyn MessageRepository,
    sender_id: Uuid,
    payload: &UserSendMessagePayload,
) -> Result<(Conversation, Message), ChatError> {
    let conversation_id = parse_id("conversationId", &payload.conversation_id)?;

    let conversation = conversations
        .find_by_id(conversation_id)
        .await
        .map_err(ChatError::LookupFailed)?
        .ok_or(ChatError::ConversationNotFound(conversation_id))?;

    if !conversation.is_member(sender_id) {
        return Err(ChatError::NotAMember { user_id: sender_id, conversation_id });
    }

    let reply_to = match payload.reply_to.as_deref() {
        Some(raw) if !raw.is_empty() => Some(parse_id("replyTo", raw)?),
        _ => None,
    };

    let message = construct_message(sender_id, conversation_id, reply_to, payload.content.clone());
    messages.insert(&message).await.map_err(ChatError::PersistenceFailed)?;

    Ok((conversation, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_defaults() {
        let (sender, conversation) = (Uuid::now_v7(), Uuid::now_v7());
        let message = construct_message(sender, conversation, None, "hello world".to_owned());

        assert_eq!(message.sender_id, sender);
        assert_eq!(message.conversation_id, conversation);
        assert_eq!(message.status, "delivered");
        assert!(message.emotions.is_empty());
        assert!(message.reply_to.is_none());
        assert_eq!(message.created_at, message.updated_at);
    }

    #[test]
    fn fresh_ids_every_time() {
        let (sender, conversation) = (Uuid::now_v7(), Uuid::now_v7());
        let a = construct_message(sender, conversation, None, String::new());
        let b = construct_message(sender, conversation, None, String::new());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn malformed_ids_are_invalid_payload() {
        assert!(matches!(parse_id("conversationId", "wrongID"), Err(ChatError::InvalidPayload(_))));
        assert!(parse_id("conversationId", &Uuid::now_v7().to_string()).is_ok());
    }
}
