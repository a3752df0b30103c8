use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from the storage layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Master pool plus an optional read replica.
///
/// All point reads go to the replica when one is configured.
#[derive(Debug, Clone)]
pub struct DatabaseManager {
    master: PgPool,
    replica: Option<PgPool>,
}

impl DatabaseManager {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        if config.master_dsn.is_empty() {
            return Err(DatabaseError::ConfigMissing("MASTER_DSN"));
        }

        let timeout = Duration::from_secs(config.connection_timeout);

        let master = PgPoolOptions::new()
            .max_connections(config.master_max_connections)
            .acquire_timeout(timeout)
            .connect(&config.master_dsn)
            .await?;
        info!("Created master pool for: {}", Self::display_target(&config.master_dsn));

        let replica = match config.replica_dsn.as_deref() {
            Some(dsn) => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.replica_max_connections)
                    .acquire_timeout(timeout)
                    .connect(dsn)
                    .await?;
                info!("Created replica pool for: {}", Self::display_target(dsn));
                Some(pool)
            }
            None => None,
        };

        Ok(Self { master, replica })
    }

    /// Pool used for reads
    pub fn reader(&self) -> &PgPool {
        self.replica.as_ref().unwrap_or(&self.master)
    }

    /// Pings every pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.master).await?;
        if let Some(replica) = &self.replica {
            sqlx::query("SELECT 1").execute(replica).await?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.master.close().await;
        if let Some(replica) = &self.replica {
            replica.close().await;
        }
        info!("Closed database pools");
    }

    /// host:port/database for logs, never the credentials
    fn display_target(dsn: &str) -> String {
        match url::Url::parse(dsn) {
            Ok(url) => format!(
                "{}:{}{}",
                url.host_str().unwrap_or("localhost"),
                url.port().unwrap_or(5432),
                url.path()
            ),
            Err(_) => "<unparseable dsn>".to_string(),
        }
    }
}
