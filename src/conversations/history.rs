use std::sync::Arc;

use axum::{debug_handler, extract::{Path, Query, State}, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::Message,
    identity::Identity,
    repo::{ConversationRepository, MessageRepository},
    AppResult, AppState,
};

use super::conversation::member_conversation;

const DEFAULT_LIMIT: u32 = 30;
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    limit: Option<u32>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn messages(
    identity: Identity,
    State(conversations): State<Arc<dyn ConversationRepository>>,
    State(messages): State<Arc<dyn MessageRepository>>,
    Path(id): Path<Uuid>,
    Query(HistoryQuery { limit }): Query<HistoryQuery>,
) -> AppResult<Json<Vec<Message>>> {
    member_conversation(&*conversations, identity, id).await?;

    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    Ok(Json(messages.find_by_conversation(id, limit).await?))
}
