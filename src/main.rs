use std::{str::FromStr, sync::Arc};

use murmur::{
    AppState,
    config::Config,
    db, logging,
    repo::{SqliteConversationRepository, SqliteMessageRepository},
    session::{MemorySessionStore, RedisSessionStore, SessionManager, SessionStore},
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let config = Config::from_env()?;

    let db_pool = SqlitePoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect_with(SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true))
        .await?;
    db::migrate(&db_pool).await?;

    let session_store: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisSessionStore::connect(url).await?),
        None => {
            tracing::warn!("REDIS_URL not set, sessions are kept in this process");
            Arc::new(MemorySessionStore::default())
        }
    };

    let app_state = AppState::new(
        SessionManager::new(session_store),
        Arc::new(SqliteConversationRepository::new(db_pool.clone())),
        Arc::new(SqliteMessageRepository::new(db_pool)),
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, murmur::app(app_state)).await?;
    Ok(())
}
