//! Generic entity layer: query and mutation builders, eager loading, relay
//! pagination and global node resolution over SQLite.

pub mod client;
pub mod collect;
pub mod context;
pub mod cursor;
pub mod eager;
pub mod entity;
pub mod error;
pub mod insert;
pub mod loader;
pub mod node;
pub mod pagination;
pub mod predicate;
pub mod query;
pub mod schema;
pub mod select;
pub mod tables;
pub mod update;

pub use client::{Client, ClientConfig, DEFAULT_TYPE_TABLE, EntityClient};
pub use collect::FieldSelection;
pub use context::QueryContext;
pub use cursor::Cursor;
pub use entity::{EagerLoad, EdgeSlot, Entity};
pub use error::{EntError, NotFoundError};
pub use loader::{EntityLoader, HasForeignKey, RelationLoader};
pub use node::{
    Field, NodeEdge, NodeFields, NodeLoader, NodeRegistry, NodeView, Noder, TABLE_STRIDE,
};
pub use pagination::{Connection, Edge, PageInfo, PaginationArgs};
pub use predicate::{Order, OrderDirection, Predicate, SqlValue};
pub use query::EntityQuery;
pub use schema::{ColumnDef, JoinTableSchema, TableSchema};
pub use select::{Aggregate, EntitySelect};
pub use tables::{TableDirectory, TableSource};
pub use update::UpdateBuilder;
