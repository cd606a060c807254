use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use uuid::Uuid;

use super::SessionStore;

/// One Redis set per user; the members are connection ids.
#[derive(Clone)]
pub struct RedisSessionStore {
    manager: ConnectionManager,
}

fn sessions_key(user_id: Uuid) -> String {
    format!("sessions:{user_id}")
}

impl RedisSessionStore {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = Client::open(url)?;
        let mut manager = ConnectionManager::new(client).await?;
        redis::cmd("PING").query_async::<_, ()>(&mut manager).await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn add(&self, user_id: Uuid, connection_id: &str) -> anyhow::Result<()> {
        let mut conn = self.manager.clone();
        conn.sadd::<_, _, ()>(sessions_key(user_id), connection_id).await?;
        Ok(())
    }

    async fn remove(&self, user_id: Uuid, connection_id: &str) -> anyhow::Result<()> {
        let mut conn = self.manager.clone();
        conn.srem::<_, _, ()>(sessions_key(user_id), connection_id).await?;
        Ok(())
    }

    async fn members(&self, user_id: Uuid) -> anyhow::Result<Vec<String>> {
        let mut conn = self.manager.clone();
        let connections: Vec<String> = conn.smembers(sessions_key(user_id)).await?;
        Ok(connections)
    }
}
