use std::sync::Arc;

use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    appresult::HttpError,
    db::{Conversation, ConversationType},
    identity::Identity,
    repo::{ConversationExists, ConversationRepository},
    AppResult, AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewConversationRequest {
    #[serde(rename = "type")]
    kind: ConversationType,
    friend_id: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn new_conversation(
    identity: Identity,
    State(conversations): State<Arc<dyn ConversationRepository>>,
    Json(NewConversationRequest { kind, friend_id }): Json<NewConversationRequest>,
) -> AppResult<(StatusCode, Json<Conversation>)> {
    if kind != ConversationType::Individual {
        return Err(HttpError::bad_request("only individual conversations can be created"))?;
    }

    let user_id = identity.user_id;
    let friend_id = friend_id
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| HttpError::bad_request("invalid friend id"))?;
    if friend_id == user_id {
        return Err(HttpError::bad_request("can not start a conversation with yourself"))?;
    }

    let conversation = Conversation::individual(user_id, friend_id);
    if let Err(err) = conversations.insert(&conversation).await {
        if err.is::<ConversationExists>() {
            return Err(HttpError::new(StatusCode::CONFLICT, "conversation already existed"))?;
        }
        return Err(err)?;
    }
    tracing::info!(conversation_id = %conversation.id, %user_id, %friend_id, "conversation created");

    Ok((StatusCode::CREATED, Json(conversation)))
}
