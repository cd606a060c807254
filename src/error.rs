use thiserror::Error;
use uuid::Uuid;

/// Why a send was refused. Every variant is terminal for the send and is
/// reported to the originating connection only.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("conversation {0} not found")]
    ConversationNotFound(Uuid),

    #[error("user {user_id} is not a member of conversation {conversation_id}")]
    NotAMember { user_id: Uuid, conversation_id: Uuid },

    #[error("failed to persist message")]
    PersistenceFailed(#[source] anyhow::Error),

    #[error("failed to load conversation")]
    LookupFailed(#[source] anyhow::Error),
}

impl ChatError {
    pub(crate) fn invalid_id(field: &str, raw: &str) -> Self {
        ChatError::InvalidPayload(format!("{field} {raw:?} is not a valid id"))
    }
}
