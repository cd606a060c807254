//! Which live connections each user currently has.
//!
//! The relation itself lives in an external [`SessionStore`]; [`SessionManager`]
//! is the typed handle the rest of the crate is given at construction time.

mod memory;
mod redis_store;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

pub use memory::MemorySessionStore;
pub use redis_store::RedisSessionStore;

/// Set-valued store keyed by user id. Implementations must make add and
/// remove atomic on their own; callers hold no locks across calls.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn add(&self, user_id: Uuid, connection_id: &str) -> anyhow::Result<()>;
    async fn remove(&self, user_id: Uuid, connection_id: &str) -> anyhow::Result<()>;
    async fn members(&self, user_id: Uuid) -> anyhow::Result<Vec<String>>;
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Idempotent: adding the same connection twice keeps one entry.
    pub async fn add_session(&self, user_id: Uuid, connection_id: &str) -> anyhow::Result<()> {
        self.store.add(user_id, connection_id).await?;
        tracing::debug!(%user_id, connection_id, "session added");
        Ok(())
    }

    /// Removing a connection that is not there is not an error.
    pub async fn remove_session(&self, user_id: Uuid, connection_id: &str) -> anyhow::Result<()> {
        self.store.remove(user_id, connection_id).await?;
        tracing::debug!(%user_id, connection_id, "session removed");
        Ok(())
    }

    /// Empty means the user is offline.
    pub async fn get_sessions(&self, user_id: Uuid) -> anyhow::Result<Vec<String>> {
        self.store.members(user_id).await
    }
}
