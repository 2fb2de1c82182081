//! Entry point of the ORM layer: owns the pool, the table directory and the
//! node registry.

use std::marker::PhantomData;
use std::sync::Arc;

use sqlx::SqlitePool;

use super::context::QueryContext;
use super::entity::Entity;
use super::error::{EntError, NotFoundError};
use super::node::{NodeRegistry, NodeView, Noder, TABLE_STRIDE};
use super::predicate::Predicate;
use super::query::EntityQuery;
use super::tables::TableDirectory;
use crate::entities::{self, Activity, User, UsersGroup, WorkOrder};

pub const DEFAULT_TYPE_TABLE: &str = "ent_types";

/// Configuration injected by the surrounding application.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Table holding the ordered entity table names
    pub type_table: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            type_table: DEFAULT_TYPE_TABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    pool: SqlitePool,
    tables: Arc<TableDirectory>,
    registry: Arc<NodeRegistry>,
}

impl Client {
    /// Client over every entity of the crate.
    pub fn new(pool: SqlitePool, config: ClientConfig) -> Self {
        Self::with_registry(pool, config, entities::registry())
    }

    pub fn with_registry(pool: SqlitePool, config: ClientConfig, registry: NodeRegistry) -> Self {
        Self {
            pool,
            tables: Arc::new(TableDirectory::new(config.type_table)),
            registry: Arc::new(registry),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn tables(&self) -> &TableDirectory {
        &self.tables
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Resolve a global id to its typed entity.
    pub async fn noder(&self, ctx: &QueryContext, id: i64) -> Result<Box<dyn Noder>, EntError> {
        let tables = self.tables.load(&self.pool, ctx).await?;

        let index = id / TABLE_STRIDE;
        let table = usize::try_from(index)
            .ok()
            .filter(|_| id >= 0)
            .and_then(|i| tables.get(i))
            .ok_or_else(|| EntError::Unresolved {
                what: format!("table from id {}", id),
                source: NotFoundError::new("invalid/unknown"),
            })?;

        let loader = self.registry.get(table).ok_or_else(|| EntError::Unresolved {
            what: format!("noder from table {:?}", table),
            source: NotFoundError::new("invalid/unknown"),
        })?;

        loader(self, ctx, id).await
    }

    /// Resolve a global id to its generic node view.
    pub async fn node(&self, ctx: &QueryContext, id: i64) -> Result<NodeView, EntError> {
        self.noder(ctx, id).await?.node(self, ctx).await
    }

    pub fn users(&self) -> EntityClient<'_, User> {
        EntityClient::new(self)
    }

    pub fn users_groups(&self) -> EntityClient<'_, UsersGroup> {
        EntityClient::new(self)
    }

    pub fn work_orders(&self) -> EntityClient<'_, WorkOrder> {
        EntityClient::new(self)
    }

    pub fn activities(&self) -> EntityClient<'_, Activity> {
        EntityClient::new(self)
    }
}

/// Per-entity accessor returned by `Client::users()` and friends.
#[derive(Debug)]
pub struct EntityClient<'a, E> {
    pub(crate) client: &'a Client,
    _entity: PhantomData<E>,
}

impl<'a, E: Entity> EntityClient<'a, E> {
    fn new(client: &'a Client) -> Self {
        Self {
            client,
            _entity: PhantomData,
        }
    }

    pub fn query(&self) -> EntityQuery<E> {
        EntityQuery::new()
    }

    /// Fetch by row id.
    pub async fn get(&self, ctx: &QueryContext, id: i64) -> Result<E, EntError> {
        EntityQuery::<E>::new()
            .where_(Predicate::id_eq(id))
            .only(self.client, ctx)
            .await
    }

    pub async fn get_x(&self, ctx: &QueryContext, id: i64) -> E {
        match self.get(ctx, id).await {
            Ok(node) => node,
            Err(e) => panic!("{}", e),
        }
    }
}
