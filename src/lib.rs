pub mod appresult;
pub mod config;
pub mod conversations;
pub mod db;
pub mod distributor;
pub mod error;
pub mod events;
pub mod gateway;
pub mod identity;
pub mod logging;
pub mod msg;
pub mod notify;
pub mod repo;
pub mod session;
pub mod ws;

use std::sync::Arc;

use axum::{extract::FromRef, routing::{get, post}, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use appresult::{AppError, AppResult};

use distributor::MessageDistributor;
use gateway::LocalGateway;
use repo::{ConversationRepository, MessageRepository};
use session::SessionManager;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub sessions: SessionManager,
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub distributor: Arc<MessageDistributor>,
    pub gateway: Arc<LocalGateway>,
}

impl AppState {
    pub fn new(
        sessions: SessionManager,
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageRepository>,
    ) -> Self {
        let distributor = Arc::new(MessageDistributor::new(
            sessions.clone(),
            conversations.clone(),
            messages.clone(),
        ));

        AppState {
            sessions,
            conversations,
            messages,
            distributor,
            gateway: Arc::new(LocalGateway::default()),
        }
    }
}

pub fn app(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws::chat_ws))
        .route("/internal/notify", post(notify::notify))
        .nest("/conversations", conversations::router())
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health() -> &'static str {
    "ok"
}
