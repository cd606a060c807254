//! Pushing bytes to live connections.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::{RwLock, mpsc},
    task::JoinSet,
};
use uuid::Uuid;

use crate::distributor::Distribution;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("connection {0} is gone")]
    ConnectionGone(String),

    #[error("can not encode payload")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, connection_id: &str, payload: Vec<u8>) -> Result<(), PublishError>;
}

/// Connections held by this process. Each socket drains its own queue.
#[derive(Default)]
pub struct LocalGateway {
    connections: RwLock<HashMap<String, mpsc::UnboundedSender<Vec<u8>>>>,
}

impl LocalGateway {
    /// Mints a connection id and the queue its socket should drain.
    pub async fn connect(&self) -> (String, mpsc::UnboundedReceiver<Vec<u8>>) {
        let connection_id = Uuid::now_v7().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.write().await.insert(connection_id.clone(), tx);
        (connection_id, rx)
    }

    pub async fn disconnect(&self, connection_id: &str) {
        self.connections.write().await.remove(connection_id);
    }
}

#[async_trait]
impl Publisher for LocalGateway {
    async fn publish(&self, connection_id: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let connections = self.connections.read().await;
        let tx = connections
            .get(connection_id)
            .ok_or_else(|| PublishError::ConnectionGone(connection_id.to_owned()))?;
        tx.send(payload)
            .map_err(|_| PublishError::ConnectionGone(connection_id.to_owned()))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Drains a distribution, publishing every event on its own task. Failures
/// are logged and counted; they never stop the other deliveries.
pub async fn deliver(mut distribution: Distribution, publisher: Arc<dyn Publisher>) -> DeliveryReport {
    let message_id = distribution.message().id;
    let mut tasks = JoinSet::new();

    while let Some(event) = distribution.next().await {
        let publisher = publisher.clone();
        tasks.spawn(async move {
            let result = match serde_json::to_vec(&event.payload) {
                Ok(data) => publisher.publish(&event.connection_id, data).await,
                Err(err) => Err(PublishError::from(err)),
            };
            (event.connection_id, result)
        });
    }

    let mut report = DeliveryReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => report.delivered += 1,
            Ok((connection_id, Err(err))) => {
                tracing::warn!(%message_id, %connection_id, error = %err, "can not publish message");
                report.failed += 1;
            }
            Err(err) => {
                tracing::error!(%message_id, error = %err, "publish task failed");
                report.failed += 1;
            }
        }
    }

    tracing::info!(%message_id, delivered = report.delivered, failed = report.failed, "message sent");
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publishes_to_the_right_queue() {
        let gateway = LocalGateway::default();
        let (a, mut rx_a) = gateway.connect().await;
        let (_b, mut rx_b) = gateway.connect().await;

        gateway.publish(&a, b"pong".to_vec()).await.unwrap();

        assert_eq!(rx_a.recv().await.unwrap(), b"pong".to_vec());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnected_connection_is_gone() {
        let gateway = LocalGateway::default();
        let (a, _rx) = gateway.connect().await;
        gateway.disconnect(&a).await;

        assert!(matches!(
            gateway.publish(&a, b"pong".to_vec()).await,
            Err(PublishError::ConnectionGone(id)) if id == a
        ));
    }
}
