//! Database connection and schema management

pub mod schema_sync;

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::warn;

use crate::ent::{Client, ClientConfig};

pub use schema_sync::{SchemaSyncResult, sync_schema};

/// Database wrapper providing connection pool access
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database wrapper from an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn options(url: &str) -> Result<SqliteConnectOptions> {
        Ok(SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true))
    }

    /// Create a new database connection pool
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(Self::options(url)?)
            .await?;

        Ok(Self { pool })
    }

    /// Create a new database connection pool with retry logic
    /// Retries every `retry_interval` until successful
    pub async fn connect_with_retry(
        url: &str,
        max_connections: u32,
        retry_interval: Duration,
    ) -> Result<Self> {
        let options = Self::options(url)?;
        loop {
            match SqlitePoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(Duration::from_secs(10))
                .connect_with(options.clone())
                .await
            {
                Ok(pool) => return Ok(Self { pool }),
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_in_secs = retry_interval.as_secs(),
                        "Database connection failed, retrying"
                    );
                    tokio::time::sleep(retry_interval).await;
                }
            }
        }
    }

    /// Private in-memory database on a single connection.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn into_pool(self) -> SqlitePool {
        self.pool
    }

    /// ORM client over this pool
    pub fn client(&self, config: ClientConfig) -> Client {
        Client::new(self.pool.clone(), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ent::{DEFAULT_TYPE_TABLE, QueryContext};

    #[tokio::test]
    async fn test_file_database_keeps_id_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("workgraph.db").display());

        let db = Database::connect(&url, 2).await.unwrap();
        let result = sync_schema(db.pool(), DEFAULT_TYPE_TABLE).await;
        assert_eq!(result.tables_created.len(), 5);
        let client = db.client(ClientConfig::default());
        let first = client
            .users_groups()
            .create()
            .name("crew")
            .save(&QueryContext::new())
            .await
            .unwrap();
        assert_eq!(first.id, (1 << 32) + 1);
        db.into_pool().close().await;

        let db = Database::connect(&url, 2).await.unwrap();
        let result = sync_schema(db.pool(), DEFAULT_TYPE_TABLE).await;
        assert!(result.tables_created.is_empty());
        let client = db.client(ClientConfig::default());
        let second = client
            .users_groups()
            .create()
            .name("admins")
            .save(&QueryContext::new())
            .await
            .unwrap();
        assert_eq!(second.id, first.id + 1);
    }
}
