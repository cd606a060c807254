//! Pushing events from other services to every live connection of a user.

use std::sync::Arc;

use axum::{debug_handler, extract::State, Json};
use futures_util::future::join_all;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    gateway::{DeliveryReport, LocalGateway, Publisher},
    identity::Identity,
    session::SessionManager,
    AppResult, AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    pub user_id: Uuid,
    pub event: serde_json::Value,
}

pub async fn notify_user(
    sessions: &SessionManager,
    publisher: &dyn Publisher,
    user_id: Uuid,
    event: &serde_json::Value,
) -> anyhow::Result<DeliveryReport> {
    let data = serde_json::to_vec(event)?;
    let connections = sessions.get_sessions(user_id).await?;

    let results = join_all(
        connections
            .iter()
            .map(|connection_id| publisher.publish(connection_id, data.clone())),
    )
    .await;

    let mut report = DeliveryReport::default();
    for (connection_id, result) in connections.iter().zip(results) {
        match result {
            Ok(()) => report.delivered += 1,
            Err(err) => {
                tracing::warn!(%user_id, %connection_id, error = %err, "failed to publish");
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

#[debug_handler(state = AppState)]
pub(crate) async fn notify(
    caller: Identity,
    State(sessions): State<SessionManager>,
    State(gateway): State<Arc<LocalGateway>>,
    Json(NotifyRequest { user_id, event }): Json<NotifyRequest>,
) -> AppResult<Json<DeliveryReport>> {
    tracing::info!(caller_id = %caller.user_id, %user_id, "notify");
    Ok(Json(notify_user(&sessions, &*gateway, user_id, &event).await?))
}
