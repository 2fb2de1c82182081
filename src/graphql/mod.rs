//! GraphQL API over the entity graph
//!
//! Entity objects resolve their edges from eager-loaded slots when the
//! parent query collected them. Otherwise to-one and one-to-many edges batch
//! through DataLoaders, and group membership falls back to a per-edge query.

mod schema;

pub use schema::{
    ActivityConnection, QueryRoot, UserConnection, UsersGroupConnection, WorkOrderConnection,
    WorkgraphSchema, build_schema, with_loaders,
};
