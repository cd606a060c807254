use axum::{http::StatusCode, response::{IntoResponse, Response}};

use crate::error::ChatError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

/// An error that already knows which status it should be answered with.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        if let Some(err) = self.0.downcast_ref::<HttpError>() {
            return err.status;
        }

        match self.0.downcast_ref::<ChatError>() {
            Some(ChatError::InvalidPayload(_)) => StatusCode::BAD_REQUEST,
            Some(ChatError::ConversationNotFound(_)) => StatusCode::NOT_FOUND,
            Some(ChatError::NotAMember { .. }) => StatusCode::FORBIDDEN,
            Some(ChatError::PersistenceFailed(_) | ChatError::LookupFailed(_)) | None => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self.0, "request failed");
            return (status, "internal server error").into_response();
        }

        (status, self.0.to_string()).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn chat_errors_map_to_statuses() {
        let id = Uuid::now_v7();
        assert_eq!(AppError::from(ChatError::ConversationNotFound(id)).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::from(ChatError::NotAMember { user_id: id, conversation_id: id }).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(ChatError::InvalidPayload("nope".to_owned())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(ChatError::PersistenceFailed(anyhow::anyhow!("disk"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn http_errors_keep_their_status() {
        let err = AppError::from(HttpError::new(StatusCode::CONFLICT, "conversation already existed"));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn anything_else_is_internal() {
        assert_eq!(AppError::from(anyhow::anyhow!("boom")).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
