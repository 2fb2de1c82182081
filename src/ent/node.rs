//! Generic node views and the table-name → loader registry used by global
//! node resolution.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use async_graphql::SimpleObject;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;

use super::client::Client;
use super::context::QueryContext;
use super::entity::Entity;
use super::error::EntError;
use super::predicate::Predicate;
use super::query::EntityQuery;

/// Global ids are `table_index * TABLE_STRIDE + row`.
pub const TABLE_STRIDE: i64 = (1 << 32) - 1;

/// Scalar field descriptor of a node. `value` is JSON-encoded.
#[derive(SimpleObject, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Field {
    #[graphql(name = "type")]
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    pub value: String,
}

impl Field {
    pub fn new<T: Serialize + ?Sized>(
        type_name: &str,
        name: &str,
        value: &T,
    ) -> Result<Self, EntError> {
        Ok(Self {
            type_name: type_name.to_string(),
            name: name.to_string(),
            value: serde_json::to_string(value)?,
        })
    }
}

/// Relationship descriptor of a node.
#[derive(SimpleObject, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NodeEdge {
    #[graphql(name = "type")]
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    pub ids: Vec<i64>,
}

impl NodeEdge {
    pub fn new(type_name: &str, name: &str, ids: Vec<i64>) -> Self {
        Self {
            type_name: type_name.to_string(),
            name: name.to_string(),
            ids,
        }
    }
}

/// Generic serialized view of any entity.
#[derive(SimpleObject, Serialize, Debug, Clone, PartialEq, Eq)]
#[graphql(name = "Node")]
pub struct NodeView {
    pub id: i64,
    #[graphql(name = "type")]
    #[serde(rename = "type")]
    pub type_name: String,
    pub fields: Vec<Field>,
    pub edges: Vec<NodeEdge>,
}

impl NodeView {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn edge(&self, name: &str) -> Option<&NodeEdge> {
        self.edges.iter().find(|e| e.name == name)
    }
}

/// Ordered scalar field descriptors. Derived with `#[derive(NodeFields)]`.
pub trait NodeFields {
    fn node_fields(&self) -> Result<Vec<Field>, EntError>;
}

/// An entity that can describe itself as a [`NodeView`].
#[async_trait]
pub trait Noder: Send + Sync + fmt::Debug {
    fn node_id(&self) -> i64;

    fn node_type(&self) -> &'static str;

    /// Build the node view, running one id-only query per edge.
    async fn node(&self, client: &Client, ctx: &QueryContext) -> Result<NodeView, EntError>;

    fn as_any(&self) -> &dyn Any;
}

/// Loads the entity with global id `id` from one table.
pub type NodeLoader = for<'a> fn(
    &'a Client,
    &'a QueryContext,
    i64,
) -> BoxFuture<'a, Result<Box<dyn Noder>, EntError>>;

/// Table name → typed loader, built once at startup.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    loaders: HashMap<&'static str, NodeLoader>,
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("tables", &self.loaders.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<E: Entity + Noder>(mut self) -> Self {
        self.loaders.insert(E::TABLE, load_noder::<E>);
        self
    }

    pub fn get(&self, table: &str) -> Option<NodeLoader> {
        self.loaders.get(table).copied()
    }

    pub fn contains(&self, table: &str) -> bool {
        self.loaders.contains_key(table)
    }
}

fn load_noder<'a, E: Entity + Noder>(
    client: &'a Client,
    ctx: &'a QueryContext,
    id: i64,
) -> BoxFuture<'a, Result<Box<dyn Noder>, EntError>> {
    Box::pin(async move {
        let node = EntityQuery::<E>::new()
            .where_(Predicate::id_eq(id))
            .collect_fields(ctx)
            .only(client, ctx)
            .await?;
        Ok(Box::new(node) as Box<dyn Noder>)
    })
}
