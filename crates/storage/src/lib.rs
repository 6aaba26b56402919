use std::time::Duration;

use anyhow::{Context, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

/// Idle timeout and max lifetime for an in-memory database's only
/// connection. Recycling it would swap in a fresh, empty database.
const PINNED: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 100);

/// Connection pool settings for the backing store.
#[derive(Clone, Debug)]
pub struct PoolSettings {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
    /// Log every statement sqlx executes at debug level.
    pub sql_logging: bool,
}

impl PoolSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// An in-memory SQLite database only lives as long as its connection,
    /// so the pool must never hold more than one.
    fn is_in_memory(&self) -> bool {
        self.url.starts_with("sqlite::memory:") || self.url.contains("mode=memory")
    }

    fn connect_options(&self) -> ConnectOptions {
        let mut opts = ConnectOptions::new(self.url.clone());
        opts.min_connections(1)
            .connect_timeout(self.connect_timeout)
            .sqlx_logging(self.sql_logging)
            .sqlx_logging_level(log::LevelFilter::Debug);
        if self.is_in_memory() {
            opts.max_connections(1)
                .idle_timeout(PINNED)
                .max_lifetime(PINNED);
        } else {
            opts.max_connections(self.max_connections.max(1));
        }
        opts
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".into(),
            max_connections: 5,
            connect_timeout: Duration::from_secs(8),
            sql_logging: false,
        }
    }
}

/// Connect to the database and return a SeaORM [`DatabaseConnection`].
pub async fn connect(settings: &PoolSettings) -> Result<DatabaseConnection> {
    let opts = settings.connect_options();
    let max = opts.get_max_connections().unwrap_or(1);
    let db = Database::connect(opts)
        .await
        .with_context(|| format!("failed to connect to {}", redact(&settings.url)))?;
    log::info!("connected to {} (max {max} connections)", redact(&settings.url));
    Ok(db)
}

/// Round-trip to the store to check it is still reachable.
pub async fn ping(db: &DatabaseConnection) -> Result<()> {
    db.ping().await.context("database ping failed")
}

/// Strip credentials from a connection url before it ends up in logs.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            format!("{}://***{}", &url[..scheme], &url[at..])
        }
        _ => url.to_owned(),
    }
}
