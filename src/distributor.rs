use std::{collections::HashSet, sync::Arc};

use tokio::{sync::mpsc, task::JoinSet};
use uuid::Uuid;

use crate::{
    db::{Conversation, Message},
    error::ChatError,
    events::{Delivery, UserSendMessagePayload},
    identity::Identity,
    msg,
    repo::{ConversationRepository, MessageRepository},
    session::SessionManager,
};

/// One payload bound for one live connection.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionEvent {
    pub connection_id: String,
    pub payload: Delivery,
}

/// Fan-out of one accepted message. The stream ends (`next` returns `None`)
/// once every member's connections have been enumerated.
#[derive(Debug)]
pub struct Distribution {
    message: Message,
    events: mpsc::UnboundedReceiver<DistributionEvent>,
}

impl Distribution {
    /// The message as it was persisted.
    pub fn message(&self) -> &Message {
        &self.message
    }

    pub async fn next(&mut self) -> Option<DistributionEvent> {
        self.events.recv().await
    }

    pub async fn collect(mut self) -> Vec<DistributionEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }
}

pub struct MessageDistributor {
    sessions: SessionManager,
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
}

impl MessageDistributor {
    pub fn new(
        sessions: SessionManager,
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageRepository>,
    ) -> Self {
        Self { sessions, conversations, messages }
    }

    /// Validates and persists the message, then starts the fan-out.
    ///
    /// A rejected or failed send returns before any event exists. Once this
    /// returns `Ok` the message is durable and every enumerated connection
    /// gets an event.
    pub async fn send_message(
        &self,
        sender: &Identity,
        connection_id: &str,
        payload: UserSendMessagePayload,
    ) -> Result<Distribution, ChatError> {
        let (conversation, message) =
            msg::accept_message(&*self.conversations, &*self.messages, sender.user_id, &payload).await?;

        tracing::info!(
            message_id = %message.id,
            conversation_id = %message.conversation_id,
            sender_id = %sender.user_id,
            "message stored"
        );

        Ok(self.distribute(conversation, message, sender.user_id, connection_id, payload.resolve_id))
    }

    fn distribute(
        &self,
        conversation: Conversation,
        message: Message,
        sender_id: Uuid,
        origin: &str,
        resolve_id: String,
    ) -> Distribution {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut lookups = JoinSet::new();
        let mut seen = HashSet::new();
        for member in conversation.members {
            if !seen.insert(member.user_id) {
                continue;
            }
            let sessions = self.sessions.clone();
            lookups.spawn(async move {
                let connections = sessions.get_sessions(member.user_id).await;
                (member.user_id, connections)
            });
        }

        let fanned = message.clone();
        let origin = origin.to_owned();
        tokio::spawn(async move {
            while let Some(joined) = lookups.join_next().await {
                let (user_id, connections) = match joined {
                    Ok(lookup) => lookup,
                    Err(err) => {
                        tracing::error!(error = %err, "session lookup task failed");
                        continue;
                    }
                };

                let mut connections = connections.unwrap_or_else(|err| {
                    tracing::warn!(%user_id, error = ?err, "can not get sessions");
                    Vec::new()
                });

                let is_sender = user_id == sender_id;
                // the originating connection is owed its ack even if its
                // session is not visible in the store yet
                if is_sender && !connections.contains(&origin) {
                    connections.push(origin.clone());
                }

                for connection_id in connections {
                    let payload = if is_sender {
                        Delivery::ack(fanned.clone(), resolve_id.clone())
                    } else {
                        Delivery::forward(fanned.clone())
                    };
                    if tx.send(DistributionEvent { connection_id, payload }).is_err() {
                        tracing::debug!(message_id = %fanned.id, "distribution dropped by consumer");
                        return;
                    }
                }
            }
            tracing::debug!(message_id = %fanned.id, "distribution complete");
        });

        Distribution { message, events: rx }
    }
}
