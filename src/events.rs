//! Frames exchanged over a chat connection.

use serde::{Deserialize, Serialize};

use crate::db::Message;

/// Inbound envelope, dispatched on its `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ChatEvent {
    UserPing,
    UserSendMessage(UserSendMessagePayload),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSendMessagePayload {
    pub content: String,
    pub conversation_id: String,
    #[serde(default)]
    pub reply_to: Option<String>,
    /// Client correlation token, echoed back in the ack.
    pub resolve_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

/// What one connection is told about an accepted message. The sender's own
/// connections get an `Ack`, everyone else a `Forward`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Delivery {
    #[serde(rename = "ServerAckSendMessage", rename_all = "camelCase")]
    Ack {
        resolve_id: String,
        message: Message,
        error: ErrorBody,
    },
    #[serde(rename = "ServerSendMessage")]
    Forward { message: Message },
}

impl Delivery {
    pub fn ack(message: Message, resolve_id: String) -> Self {
        Delivery::Ack { resolve_id, message, error: ErrorBody::default() }
    }

    pub fn forward(message: Message) -> Self {
        Delivery::Forward { message }
    }

    pub fn message(&self) -> &Message {
        match self {
            Delivery::Ack { message, .. } | Delivery::Forward { message } => message,
        }
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Delivery::Ack { .. })
    }
}

/// Sent to the originating connection when its send is rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "ServerError", rename_all = "camelCase")]
pub struct ServerError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolve_id: Option<String>,
    pub error: ErrorBody,
}

impl ServerError {
    pub fn new(resolve_id: Option<String>, error: impl Into<String>) -> Self {
        Self { resolve_id, error: ErrorBody::new(error) }
    }
}
