use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Without one, sessions live in this process only.
    pub redis_url: Option<String>,
    pub bind_addr: String,
    pub database_max_connections: u32,
}

impl Config {
    /// Reads the environment, after loading `.env` if there is one.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let redis_url = lookup("REDIS_URL").filter(|url| !url.is_empty());
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_owned());
        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS {raw:?} is not a number"))?,
            None => 16,
        };

        Ok(Config {
            database_url,
            redis_url,
            bind_addr,
            database_max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[("DATABASE_URL", "sqlite://chat.db")]).unwrap();
        assert_eq!(config.database_url, "sqlite://chat.db");
        assert_eq!(config.redis_url, None);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.database_max_connections, 16);
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("DATABASE_URL", "sqlite://chat.db"),
            ("REDIS_URL", "redis://localhost:6379"),
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
        ])
        .unwrap();
        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:6379"));
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.database_max_connections, 4);
    }

    #[test]
    fn database_url_is_required() {
        assert!(config(&[]).is_err());
        assert!(config(&[("DATABASE_URL", "sqlite://chat.db"), ("DATABASE_MAX_CONNECTIONS", "lots")]).is_err());
    }
}
