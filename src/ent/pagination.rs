//! Relay cursor pagination over entity queries.
//!
//! Cursors carry the row id. Forward pages read `first + 1` rows ascending
//! and backward pages `last + 1` rows descending; the extra lookahead row tells
//! whether another page exists and is dropped before edges are built.
//!
//! Usage: use the `define_connection!` macro to create type-specific GraphQL
//! connections.

use async_graphql::SimpleObject;

use super::client::Client;
use super::context::QueryContext;
use super::cursor::Cursor;
use super::entity::Entity;
use super::error::EntError;
use super::predicate::{Order, Predicate};
use super::query::EntityQuery;

/// Information about pagination in a connection
#[derive(SimpleObject, Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    /// When paginating forwards, are there more items?
    pub has_next_page: bool,
    /// When paginating backwards, are there more items?
    pub has_previous_page: bool,
    /// Cursor of the first item in this page
    pub start_cursor: Option<Cursor>,
    /// Cursor of the last item in this page
    pub end_cursor: Option<Cursor>,
}

/// An edge in a connection, containing a node and cursor (internal use)
#[derive(Debug, Clone)]
pub struct Edge<T> {
    pub node: T,
    pub cursor: Cursor,
}

/// A paginated connection result (internal use)
#[derive(Debug, Clone)]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
}

impl<T> Connection<T> {
    /// Create an empty connection
    pub fn empty() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo::default(),
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|e| &e.node)
    }
}

/// Relay pagination arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationArgs {
    pub after: Option<Cursor>,
    pub first: Option<i32>,
    pub before: Option<Cursor>,
    pub last: Option<i32>,
}

impl PaginationArgs {
    pub fn first(n: i32) -> Self {
        Self {
            first: Some(n),
            ..Self::default()
        }
    }

    pub fn last(n: i32) -> Self {
        Self {
            last: Some(n),
            ..Self::default()
        }
    }

    pub fn after(mut self, cursor: Cursor) -> Self {
        self.after = Some(cursor);
        self
    }

    pub fn before(mut self, cursor: Cursor) -> Self {
        self.before = Some(cursor);
        self
    }

    /// Check the arguments. `Ok(false)` means a zero-sized page was requested
    /// and no query should run.
    pub fn validate(&self) -> Result<bool, EntError> {
        if self.first.is_some() && self.last.is_some() {
            return Err(EntError::InvalidPagination);
        }
        for count in [self.first, self.last].into_iter().flatten() {
            if count == 0 {
                return Ok(false);
            }
            if count < 0 {
                return Err(EntError::InvalidPagination);
            }
        }
        Ok(true)
    }
}

impl<E: Entity> EntityQuery<E> {
    /// Execute the query as a relay connection page.
    pub async fn paginate(
        self,
        client: &Client,
        ctx: &QueryContext,
        args: PaginationArgs,
    ) -> Result<Connection<E>, EntError> {
        if !args.validate()? {
            return Ok(Connection::empty());
        }

        let mut query = self;
        if let Some(after) = args.after {
            query = query.where_(Predicate::id_gt(after.id));
        }
        if let Some(before) = args.before {
            query = query.where_(Predicate::id_lt(before.id));
        }

        query = match (args.first, args.last) {
            (Some(first), _) => query.order(Order::asc("id")).limit(i64::from(first) + 1),
            (None, Some(last)) => query.order(Order::desc("id")).limit(i64::from(last) + 1),
            (None, None) => query.order(Order::asc("id")),
        };

        if let Some(node) = ctx.fields().and_then(|f| f.field_for_path(&["edges", "node"])) {
            query = query.collect_selection(node);
        }

        let mut nodes = query.all(client, ctx).await?;
        if nodes.is_empty() {
            return Ok(Connection::empty());
        }

        if args.last.is_some() {
            nodes.reverse();
        }

        let mut page_info = PageInfo::default();
        match (args.first, args.last) {
            (Some(first), _) if nodes.len() > first as usize => {
                page_info.has_next_page = true;
                nodes.pop();
            }
            (None, Some(last)) if nodes.len() > last as usize => {
                page_info.has_previous_page = true;
                nodes.remove(0);
            }
            _ => {}
        }

        let edges: Vec<Edge<E>> = nodes
            .into_iter()
            .map(|node| Edge {
                cursor: Cursor::new(node.id()),
                node,
            })
            .collect();

        page_info.start_cursor = edges.first().map(|e| e.cursor);
        page_info.end_cursor = edges.last().map(|e| e.cursor);

        Ok(Connection { edges, page_info })
    }
}

/// Macro to define a GraphQL connection type for a specific entity
///
/// Usage:
/// ```ignore
/// define_connection!(WorkOrderConnection, WorkOrderEdge, WorkOrder);
/// ```
#[macro_export]
macro_rules! define_connection {
    ($conn_name:ident, $edge_name:ident, $node_type:ty) => {
        /// Edge containing a node and cursor
        #[derive(async_graphql::SimpleObject, Debug, Clone)]
        pub struct $edge_name {
            /// The item at the end of the edge
            pub node: $node_type,
            /// A cursor for pagination
            pub cursor: $crate::ent::Cursor,
        }

        /// Connection containing edges and page info
        #[derive(async_graphql::SimpleObject, Debug, Clone)]
        pub struct $conn_name {
            /// The edges in this connection
            pub edges: Vec<$edge_name>,
            /// Pagination information
            pub page_info: $crate::ent::PageInfo,
        }

        impl From<$crate::ent::Connection<$node_type>> for $conn_name {
            fn from(conn: $crate::ent::Connection<$node_type>) -> Self {
                Self {
                    edges: conn
                        .edges
                        .into_iter()
                        .map(|e| $edge_name {
                            node: e.node,
                            cursor: e.cursor,
                        })
                        .collect(),
                    page_info: conn.page_info,
                }
            }
        }
    };
}
