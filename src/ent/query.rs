//! Generic query builder shared by every entity.
//!
//! Builds parameterized SELECT statements from predicates, orderings and
//! limits, executes them against the client's pool and hydrates records.
//! Edges requested through `with_*` setters or `collect_fields` are batch
//! loaded after the parent rows are fetched.

use std::fmt;

use sqlx::SqliteConnection;
use tracing::debug;

use super::client::Client;
use super::collect::FieldSelection;
use super::context::QueryContext;
use super::entity::{EagerLoad, Entity};
use super::error::EntError;
use super::predicate::{Order, Predicate, SqlValue, conjunction};

pub struct EntityQuery<E: Entity> {
    predicates: Vec<Predicate>,
    order: Vec<Order>,
    limit: Option<i64>,
    offset: Option<i64>,
    pub(crate) eager: E::With,
}

impl<E: Entity> Clone for EntityQuery<E> {
    fn clone(&self) -> Self {
        Self {
            predicates: self.predicates.clone(),
            order: self.order.clone(),
            limit: self.limit,
            offset: self.offset,
            eager: self.eager.clone(),
        }
    }
}

impl<E: Entity> Default for EntityQuery<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> fmt::Debug for EntityQuery<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityQuery")
            .field("table", &E::TABLE)
            .field("predicates", &self.predicates)
            .field("order", &self.order)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl<E: Entity> EntityQuery<E> {
    pub fn new() -> Self {
        Self {
            predicates: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            eager: E::With::default(),
        }
    }

    /// Add a predicate. Predicates are AND-ed.
    pub fn where_(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    /// Eager-load the edges requested by the context's field selection.
    /// Without a selection nothing extra is loaded.
    pub fn collect_fields(self, ctx: &QueryContext) -> Self {
        match ctx.fields() {
            Some(fields) => self.collect_selection(fields),
            None => self,
        }
    }

    /// Eager-load the edges named in the children of `fields`.
    pub fn collect_selection(mut self, fields: &FieldSelection) -> Self {
        self.eager.collect(fields);
        self
    }

    /// Render the statement for `projection`, returning SQL and bound values.
    pub fn to_sql(&self, projection: &str) -> (String, Vec<SqlValue>) {
        self.render(projection, &[])
    }

    pub(crate) fn render(&self, projection: &str, group_by: &[&str]) -> (String, Vec<SqlValue>) {
        let mut sql = format!("SELECT {} FROM {}", projection, E::TABLE);
        let mut values = Vec::new();

        if !self.predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conjunction(&self.predicates, &mut values));
        }

        if !group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&group_by.join(", "));
        }

        if !self.order.is_empty() {
            let order: Vec<String> = self.order.iter().map(Order::to_sql).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {}", limit)),
            // SQLite requires a LIMIT before OFFSET
            (None, Some(_)) => sql.push_str(" LIMIT -1"),
            (None, None) => {}
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        (sql, values)
    }

    /// `column IN (SELECT select FROM <this query>)`, used by traversals
    /// from a whole query to its neighbours.
    pub fn subquery(&self, column: &'static str, select: &str) -> Predicate {
        let (sql, values) = self.to_sql(select);
        Predicate::InQuery {
            column,
            sql,
            values,
        }
    }

    /// Ids of the matching rows, read through `conn`.
    pub(crate) async fn fetch_ids(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<i64>, sqlx::Error> {
        let (sql, values) = self.to_sql("id");
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for value in &values {
            query = value.bind_to_scalar(query);
        }
        query.fetch_all(&mut *conn).await
    }

    /// Execute the query and return all matching entities.
    pub async fn all(self, client: &Client, ctx: &QueryContext) -> Result<Vec<E>, EntError> {
        let columns = E::SCHEMA.column_names().join(", ");
        let (sql, values) = self.to_sql(&columns);
        debug!(sql = %sql, entity = E::TYPE_NAME, "Executing entity query");

        let mut query = sqlx::query(&sql);
        for value in &values {
            query = value.bind_to_query(query);
        }

        let rows = ctx.run(query.fetch_all(client.pool())).await?;
        let mut nodes = rows
            .iter()
            .map(E::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        if !nodes.is_empty() && !self.eager.is_empty() {
            self.eager.load(client, ctx, &mut nodes).await?;
        }

        Ok(nodes)
    }

    /// Like [`all`](Self::all) but panics on error.
    pub async fn all_x(self, client: &Client, ctx: &QueryContext) -> Vec<E> {
        match self.all(client, ctx).await {
            Ok(nodes) => nodes,
            Err(e) => panic!("{}", e),
        }
    }

    /// Execute the query and return only the matching ids.
    pub async fn ids(self, client: &Client, ctx: &QueryContext) -> Result<Vec<i64>, EntError> {
        let (sql, values) = self.to_sql("id");
        debug!(sql = %sql, entity = E::TYPE_NAME, "Executing id query");

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for value in &values {
            query = value.bind_to_scalar(query);
        }

        ctx.run(query.fetch_all(client.pool())).await
    }

    pub async fn ids_x(self, client: &Client, ctx: &QueryContext) -> Vec<i64> {
        match self.ids(client, ctx).await {
            Ok(ids) => ids,
            Err(e) => panic!("{}", e),
        }
    }

    /// First matching entity; `NotFound` when there is none.
    pub async fn first(self, client: &Client, ctx: &QueryContext) -> Result<E, EntError> {
        self.limit(1)
            .all(client, ctx)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EntError::not_found(E::LABEL))
    }

    /// Like [`first`](Self::first), returning `None` for not found and
    /// panicking on any other error.
    pub async fn first_x(self, client: &Client, ctx: &QueryContext) -> Option<E> {
        match self.first(client, ctx).await {
            Ok(node) => Some(node),
            Err(e) if e.is_not_found() => None,
            Err(e) => panic!("{}", e),
        }
    }

    pub async fn first_id(self, client: &Client, ctx: &QueryContext) -> Result<i64, EntError> {
        self.limit(1)
            .ids(client, ctx)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EntError::not_found(E::LABEL))
    }

    pub async fn first_id_x(self, client: &Client, ctx: &QueryContext) -> Option<i64> {
        match self.first_id(client, ctx).await {
            Ok(id) => Some(id),
            Err(e) if e.is_not_found() => None,
            Err(e) => panic!("{}", e),
        }
    }

    /// The single matching entity. `NotFound` for zero rows, `NotSingular`
    /// for more than one.
    pub async fn only(self, client: &Client, ctx: &QueryContext) -> Result<E, EntError> {
        let mut nodes = self.limit(2).all(client, ctx).await?;
        match nodes.len() {
            1 => Ok(nodes.remove(0)),
            0 => Err(EntError::not_found(E::LABEL)),
            _ => Err(EntError::NotSingular(E::LABEL.to_string())),
        }
    }

    pub async fn only_x(self, client: &Client, ctx: &QueryContext) -> E {
        match self.only(client, ctx).await {
            Ok(node) => node,
            Err(e) => panic!("{}", e),
        }
    }

    pub async fn only_id(self, client: &Client, ctx: &QueryContext) -> Result<i64, EntError> {
        let ids = self.limit(2).ids(client, ctx).await?;
        match ids.as_slice() {
            [id] => Ok(*id),
            [] => Err(EntError::not_found(E::LABEL)),
            _ => Err(EntError::NotSingular(E::LABEL.to_string())),
        }
    }

    pub async fn only_id_x(self, client: &Client, ctx: &QueryContext) -> i64 {
        match self.only_id(client, ctx).await {
            Ok(id) => id,
            Err(e) => panic!("{}", e),
        }
    }

    /// Count matching rows.
    pub async fn count(self, client: &Client, ctx: &QueryContext) -> Result<i64, EntError> {
        let (sql, values) = self.to_sql("COUNT(*)");
        debug!(sql = %sql, entity = E::TYPE_NAME, "Executing count query");

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for value in &values {
            query = value.bind_to_scalar(query);
        }

        ctx.run(async { query.fetch_one(client.pool()).await.map_err(EntError::Count) })
            .await
    }

    pub async fn count_x(self, client: &Client, ctx: &QueryContext) -> i64 {
        match self.count(client, ctx).await {
            Ok(n) => n,
            Err(e) => panic!("{}", e),
        }
    }

    /// Whether any row matches.
    pub async fn exist(self, client: &Client, ctx: &QueryContext) -> Result<bool, EntError> {
        match self.count(client, ctx).await {
            Ok(n) => Ok(n > 0),
            Err(EntError::Cancelled) => Err(EntError::Cancelled),
            Err(e) => Err(EntError::Exist(Box::new(e))),
        }
    }

    pub async fn exist_x(self, client: &Client, ctx: &QueryContext) -> bool {
        match self.exist(client, ctx).await {
            Ok(exists) => exists,
            Err(e) => panic!("{}", e),
        }
    }
}
