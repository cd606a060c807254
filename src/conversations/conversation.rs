use std::sync::Arc;

use axum::{debug_handler, extract::{Path, Query, State}, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    appresult::HttpError,
    db::{Conversation, ConversationType},
    error::ChatError,
    identity::Identity,
    repo::ConversationRepository,
    AppResult, AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConversationsQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    friend_id: Option<String>,
}

/// Loads a conversation the caller belongs to.
pub(crate) async fn member_conversation(
    conversations: &dyn ConversationRepository,
    identity: Identity,
    id: Uuid,
) -> AppResult<Conversation> {
    let conversation = conversations
        .find_by_id(id)
        .await?
        .ok_or(ChatError::ConversationNotFound(id))?;

    if !conversation.is_member(identity.user_id) {
        return Err(ChatError::NotAMember { user_id: identity.user_id, conversation_id: id })?;
    }

    Ok(conversation)
}

#[debug_handler(state = AppState)]
pub(crate) async fn conversation(
    identity: Identity,
    State(conversations): State<Arc<dyn ConversationRepository>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Conversation>> {
    Ok(Json(member_conversation(&*conversations, identity, id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn conversations(
    identity: Identity,
    State(conversations): State<Arc<dyn ConversationRepository>>,
    Query(ConversationsQuery { kind, friend_id }): Query<ConversationsQuery>,
) -> AppResult<Json<Vec<Conversation>>> {
    let user_id = identity.user_id;

    let found = match kind.as_deref().unwrap_or("all") {
        "all" => conversations.find_by_members(&[user_id], None).await?,
        "individual" => {
            let friend_id = friend_id
                .as_deref()
                .and_then(|raw| Uuid::parse_str(raw).ok())
                .ok_or_else(|| HttpError::bad_request("friend id is required"))?;
            conversations
                .find_by_members(&[user_id, friend_id], Some(ConversationType::Individual))
                .await?
        }
        "group" => {
            conversations
                .find_by_members(&[user_id], Some(ConversationType::Group))
                .await?
        }
        _ => {
            return Err(HttpError::bad_request(
                "invalid query type, must be 'all', 'group' or 'individual'",
            ))?;
        }
    };

    Ok(Json(found))
}
