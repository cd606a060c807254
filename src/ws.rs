use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};

use crate::{
    distributor::MessageDistributor,
    events::{ChatEvent, ServerError},
    gateway::{self, LocalGateway, Publisher},
    identity::Identity,
    session::SessionManager,
    AppState,
};

#[debug_handler(state = AppState)]
pub async fn chat_ws(
    identity: Identity,
    State(sessions): State<SessionManager>,
    State(distributor): State<Arc<MessageDistributor>>,
    State(gateway): State<Arc<LocalGateway>>,

    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_connection(socket, identity, sessions, distributor, gateway))
}

async fn serve_connection(
    socket: WebSocket,
    identity: Identity,
    sessions: SessionManager,
    distributor: Arc<MessageDistributor>,
    gateway: Arc<LocalGateway>,
) {
    let user_id = identity.user_id;
    let (connection_id, mut outbox) = gateway.connect().await;

    if let Err(err) = sessions.add_session(user_id, &connection_id).await {
        tracing::error!(%user_id, %connection_id, error = ?err, "failed to add session");
        gateway.disconnect(&connection_id).await;
        return;
    }
    tracing::info!(%user_id, %connection_id, "connected");

    let (mut sender, mut receiver) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(data) = outbox.recv().await {
            let frame = match String::from_utf8(data) {
                Ok(text) => WsMessage::Text(text.into()),
                Err(err) => WsMessage::Binary(err.into_bytes().into()),
            };
            if sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    let connection = ChatConnection {
        identity,
        connection_id: connection_id.clone(),
        distributor,
        publisher: gateway.clone(),
    };

    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => connection.handle_frame(text.as_str().as_bytes()).await,
                Some(Ok(WsMessage::Binary(data))) => connection.handle_frame(&data).await,
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    tracing::debug!(%connection_id, error = %err, "socket error");
                    break;
                }
            },
            _ = &mut writer => break,
        }
    }

    writer.abort();
    if let Err(err) = sessions.remove_session(user_id, &connection_id).await {
        tracing::error!(%user_id, %connection_id, error = ?err, "failed to remove session");
    }
    gateway.disconnect(&connection_id).await;
    tracing::info!(%user_id, %connection_id, "disconnected");
}

/// Protocol handling for one live connection, independent of the socket.
pub(crate) struct ChatConnection {
    pub(crate) identity: Identity,
    pub(crate) connection_id: String,
    pub(crate) distributor: Arc<MessageDistributor>,
    pub(crate) publisher: Arc<dyn Publisher>,
}

impl ChatConnection {
    pub(crate) async fn handle_frame(&self, data: &[u8]) {
        let event = match serde_json::from_slice::<ChatEvent>(data) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(connection_id = %self.connection_id, error = %err, "can not parse request payload");
                self.reply(&ServerError::new(None, "invalid send message event")).await;
                return;
            }
        };

        match event {
            ChatEvent::UserPing => self.send(b"pong".to_vec()).await,
            ChatEvent::UserSendMessage(payload) => {
                let resolve_id = payload.resolve_id.clone();
                match self.distributor.send_message(&self.identity, &self.connection_id, payload).await {
                    Ok(distribution) => {
                        tokio::spawn(gateway::deliver(distribution, self.publisher.clone()));
                    }
                    Err(err) => {
                        tracing::warn!(
                            user_id = %self.identity.user_id,
                            connection_id = %self.connection_id,
                            error = %err,
                            "failed to send message"
                        );
                        self.reply(&ServerError::new(Some(resolve_id), err.to_string())).await;
                    }
                }
            }
            ChatEvent::Unsupported => {
                tracing::warn!(connection_id = %self.connection_id, "not support this event");
                self.reply(&ServerError::new(None, "not support this event")).await;
            }
        }
    }

    async fn reply(&self, error: &ServerError) {
        match serde_json::to_vec(error) {
            Ok(data) => self.send(data).await,
            Err(err) => tracing::error!(error = %err, "can not marshal data"),
        }
    }

    async fn send(&self, data: Vec<u8>) {
        if let Err(err) = self.publisher.publish(&self.connection_id, data).await {
            tracing::warn!(connection_id = %self.connection_id, error = %err, "can not publish message");
        }
    }
}
