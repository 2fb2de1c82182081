//! DataLoader batching for edges resolved outside an eager load.
//!
//! When a parent was fetched without its edges, each GraphQL edge resolver
//! asks a loader instead of querying on its own. The loader collects the keys
//! requested within one execution tick and answers them with a single query.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_graphql::dataloader::Loader;
use tracing::debug;

use super::client::Client;
use super::context::QueryContext;
use super::entity::Entity;
use super::error::EntError;
use super::predicate::{Order, Predicate};
use super::query::EntityQuery;

// ============================================================================
// Entity Loader
// ============================================================================

/// Batches lookups of entities by id.
///
/// ```ignore
/// let users = DataLoader::new(EntityLoader::<User>::new(client.clone()), tokio::spawn);
/// schema.data(users);
///
/// let loader = ctx.data::<DataLoader<EntityLoader<User>>>()?;
/// let owner = loader.load_one(owner_id).await?;
/// ```
pub struct EntityLoader<E> {
    client: Client,
    _entity: PhantomData<E>,
}

impl<E: Entity> EntityLoader<E> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Loader<i64> for EntityLoader<E> {
    type Value = E;
    type Error = Arc<EntError>;

    async fn load(&self, keys: &[i64]) -> Result<HashMap<i64, Self::Value>, Self::Error> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        debug!(entity = E::TYPE_NAME, keys = keys.len(), "Batch loading by id");

        let nodes = EntityQuery::<E>::new()
            .where_(Predicate::id_in(keys.iter().copied()))
            .all(&self.client, &QueryContext::new())
            .await
            .map_err(Arc::new)?;

        Ok(nodes.into_iter().map(|n| (n.id(), n)).collect())
    }
}

// ============================================================================
// Relation Loader
// ============================================================================

/// Entities carrying foreign keys to their parents.
pub trait HasForeignKey {
    /// Value of the foreign key `column`, or `None` when unset or unknown.
    fn foreign_key(&self, column: &str) -> Option<i64>;
}

/// Batches one-to-many lookups: given parent ids, loads every child whose
/// `fk_column` points at one of them, grouped by parent and ordered by id.
pub struct RelationLoader<E> {
    client: Client,
    fk_column: &'static str,
    _entity: PhantomData<E>,
}

impl<E: Entity + HasForeignKey> RelationLoader<E> {
    pub fn new(client: Client, fk_column: &'static str) -> Self {
        Self {
            client,
            fk_column,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity + HasForeignKey> Loader<i64> for RelationLoader<E> {
    type Value = Vec<E>;
    type Error = Arc<EntError>;

    async fn load(&self, keys: &[i64]) -> Result<HashMap<i64, Self::Value>, Self::Error> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        debug!(
            entity = E::TYPE_NAME,
            fk_column = self.fk_column,
            parent_count = keys.len(),
            "Batch loading relation"
        );

        let nodes = EntityQuery::<E>::new()
            .where_(Predicate::is_in(self.fk_column, keys.iter().copied()))
            .order(Order::asc("id"))
            .all(&self.client, &QueryContext::new())
            .await
            .map_err(Arc::new)?;

        let mut result: HashMap<i64, Vec<E>> = keys.iter().map(|k| (*k, Vec::new())).collect();
        for node in nodes {
            if let Some(children) = node
                .foreign_key(self.fk_column)
                .and_then(|fk| result.get_mut(&fk))
            {
                children.push(node);
            }
        }

        Ok(result)
    }
}
