mod conversation;
mod history;
mod new;

use axum::{routing::get, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(conversation::conversations).post(new::new_conversation))
        .route("/{id}", get(conversation::conversation))
        .route("/{id}/messages", get(history::messages))
}
