use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::SessionStore;

/// Single-process store, used when no Redis is configured.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, HashSet<String>>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn add(&self, user_id: Uuid, connection_id: &str) -> anyhow::Result<()> {
        self.sessions
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(connection_id.to_owned());
        Ok(())
    }

    async fn remove(&self, user_id: Uuid, connection_id: &str) -> anyhow::Result<()> {
        let mut sessions = self.sessions.write().await;
        if let Some(connections) = sessions.get_mut(&user_id) {
            connections.remove(connection_id);
            if connections.is_empty() {
                sessions.remove(&user_id);
            }
        }
        Ok(())
    }

    async fn members(&self, user_id: Uuid) -> anyhow::Result<Vec<String>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(&user_id)
            .map(|connections| connections.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::session::SessionManager;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(MemorySessionStore::default()))
    }

    #[tokio::test]
    async fn adding_twice_keeps_one_entry() {
        let sessions = manager();
        let user = Uuid::now_v7();

        sessions.add_session(user, "conn1").await.unwrap();
        sessions.add_session(user, "conn1").await.unwrap();

        assert_eq!(sessions.get_sessions(user).await.unwrap(), vec!["conn1".to_owned()]);
    }

    #[tokio::test]
    async fn offline_user_has_no_sessions() {
        let sessions = manager();
        assert!(sessions.get_sessions(Uuid::now_v7()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn removing_an_absent_session_is_fine() {
        let sessions = manager();
        let user = Uuid::now_v7();

        sessions.remove_session(user, "ghost").await.unwrap();

        sessions.add_session(user, "conn1").await.unwrap();
        sessions.add_session(user, "conn2").await.unwrap();
        sessions.remove_session(user, "conn1").await.unwrap();
        sessions.remove_session(user, "conn1").await.unwrap();

        assert_eq!(sessions.get_sessions(user).await.unwrap(), vec!["conn2".to_owned()]);
    }

    #[tokio::test]
    async fn sessions_are_per_user() {
        let sessions = manager();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        sessions.add_session(a, "a1").await.unwrap();
        sessions.add_session(b, "b1").await.unwrap();
        sessions.add_session(b, "b2").await.unwrap();

        let mut of_b = sessions.get_sessions(b).await.unwrap();
        of_b.sort();
        assert_eq!(sessions.get_sessions(a).await.unwrap(), vec!["a1".to_owned()]);
        assert_eq!(of_b, vec!["b1".to_owned(), "b2".to_owned()]);
    }
}
