//! Lazily loaded, process-wide directory of entity table names.
//!
//! The position of a name in the directory is the table index encoded in
//! global ids. The directory is read once from the schema type table; later
//! callers get the cached slice.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::SqlitePool;
use tokio::sync::Semaphore;
use tracing::debug;

use super::context::QueryContext;
use super::error::EntError;

/// Where the ordered table names come from.
#[async_trait]
pub trait TableSource: Send + Sync {
    async fn load_tables(&self, type_table: &str) -> Result<Vec<String>, sqlx::Error>;
}

#[async_trait]
impl TableSource for SqlitePool {
    async fn load_tables(&self, type_table: &str) -> Result<Vec<String>, sqlx::Error> {
        let sql = format!("SELECT type FROM {} ORDER BY id ASC", type_table);
        debug!(sql = %sql, "Executing table directory query");
        sqlx::query_scalar::<_, String>(&sql).fetch_all(self).await
    }
}

#[derive(Debug)]
pub struct TableDirectory {
    type_table: String,
    value: RwLock<Option<Arc<[String]>>>,
    // One permit: at most one physical load in flight.
    gate: Semaphore,
}

impl TableDirectory {
    pub fn new(type_table: impl Into<String>) -> Self {
        Self {
            type_table: type_table.into(),
            value: RwLock::new(None),
            gate: Semaphore::new(1),
        }
    }

    pub fn type_table(&self) -> &str {
        &self.type_table
    }

    /// The directory if it has been loaded.
    pub fn cached(&self) -> Option<Arc<[String]>> {
        self.value.read().clone()
    }

    /// Return the directory, loading it from `source` on first use.
    ///
    /// Concurrent first callers wait on the gate; cancelling `ctx` while
    /// waiting or loading returns [`EntError::Cancelled`]. A failed load is
    /// not cached.
    pub async fn load<S>(&self, source: &S, ctx: &QueryContext) -> Result<Arc<[String]>, EntError>
    where
        S: TableSource + ?Sized,
    {
        if let Some(tables) = self.cached() {
            return Ok(tables);
        }

        let _permit = tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => return Err(EntError::Cancelled),
            permit = self.gate.acquire() => permit.expect("Semaphore closed"),
        };

        if let Some(tables) = self.cached() {
            return Ok(tables);
        }

        let tables: Arc<[String]> = ctx.run(source.load_tables(&self.type_table)).await?.into();
        debug!(
            type_table = %self.type_table,
            tables = tables.len(),
            "Loaded table directory"
        );

        *self.value.write() = Some(tables.clone());
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(AtomicUsize);

    #[async_trait]
    impl TableSource for Fixed {
        async fn load_tables(&self, _: &str) -> Result<Vec<String>, sqlx::Error> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["users".into(), "work_orders".into()])
        }
    }

    #[tokio::test]
    async fn test_caches_after_first_load() {
        let source = Fixed(AtomicUsize::new(0));
        let directory = TableDirectory::new("ent_types");
        let ctx = QueryContext::new();

        assert!(directory.cached().is_none());
        let first = directory.load(&source, &ctx).await.unwrap();
        let second = directory.load(&source, &ctx).await.unwrap();

        assert_eq!(&*first, &["users".to_string(), "work_orders".to_string()]);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.0.load(Ordering::SeqCst), 1);
    }
}
