//! Column projections and grouped aggregates over an entity query.

use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{FromRow, Row};
use tracing::debug;

use super::client::Client;
use super::context::QueryContext;
use super::entity::Entity;
use super::error::EntError;
use super::query::EntityQuery;
use super::predicate::SqlValue;

/// Aggregate function applied to each group. Results are aliased by the
/// function name so `scan` targets can name their fields after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum(&'static str),
    Min(&'static str),
    Max(&'static str),
    Mean(&'static str),
}

impl Aggregate {
    pub fn to_sql(&self) -> String {
        match self {
            Aggregate::Count => "COUNT(*) AS count".to_string(),
            Aggregate::Sum(column) => format!("SUM({}) AS sum", column),
            Aggregate::Min(column) => format!("MIN({}) AS min", column),
            Aggregate::Max(column) => format!("MAX({}) AS max", column),
            Aggregate::Mean(column) => format!("AVG({}) AS mean", column),
        }
    }
}

/// Selector returned by [`EntityQuery::select`] and [`EntityQuery::group_by`].
pub struct EntitySelect<E: Entity> {
    query: EntityQuery<E>,
    columns: Vec<&'static str>,
    grouped: bool,
    aggregates: Vec<Aggregate>,
}

impl<E: Entity> EntityQuery<E> {
    /// Project the matching rows onto `columns`.
    pub fn select(self, columns: impl IntoIterator<Item = &'static str>) -> EntitySelect<E> {
        EntitySelect {
            query: self,
            columns: columns.into_iter().collect(),
            grouped: false,
            aggregates: Vec::new(),
        }
    }

    /// Group the matching rows by `columns`. Add aggregates with
    /// [`EntitySelect::aggregate`].
    pub fn group_by(self, columns: impl IntoIterator<Item = &'static str>) -> EntitySelect<E> {
        EntitySelect {
            grouped: true,
            ..self.select(columns)
        }
    }
}

impl<E: Entity> EntitySelect<E> {
    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregates.push(aggregate);
        self
    }

    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let mut projection: Vec<String> = self.columns.iter().map(|c| c.to_string()).collect();
        projection.extend(self.aggregates.iter().map(Aggregate::to_sql));
        let group_by: &[&str] = if self.grouped { &self.columns } else { &[] };
        self.query.render(&projection.join(", "), group_by)
    }

    async fn rows(&self, client: &Client, ctx: &QueryContext) -> Result<Vec<SqliteRow>, EntError> {
        let (sql, values) = self.to_sql();
        debug!(sql = %sql, entity = E::TYPE_NAME, "Executing projection");

        let mut query = sqlx::query(&sql);
        for value in &values {
            query = value.bind_to_query(query);
        }

        ctx.run(query.fetch_all(client.pool())).await
    }

    /// Decode each row into `T` by column name.
    pub async fn scan<T>(self, client: &Client, ctx: &QueryContext) -> Result<Vec<T>, EntError>
    where
        T: for<'r> FromRow<'r, SqliteRow>,
    {
        let rows = self.rows(client, ctx).await?;
        Ok(rows.iter().map(T::from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn single<T>(
        self,
        method: &'static str,
        client: &Client,
        ctx: &QueryContext,
    ) -> Result<Vec<T>, EntError>
    where
        T: for<'r> sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
    {
        if self.columns.len() + self.aggregates.len() != 1 {
            return Err(EntError::MultipleFields(method));
        }
        let rows = self.rows(client, ctx).await?;
        Ok(rows
            .iter()
            .map(|row| row.try_get::<T, _>(0))
            .collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn strings(self, client: &Client, ctx: &QueryContext) -> Result<Vec<String>, EntError> {
        self.single("strings", client, ctx).await
    }

    pub async fn ints(self, client: &Client, ctx: &QueryContext) -> Result<Vec<i64>, EntError> {
        self.single("ints", client, ctx).await
    }

    pub async fn floats(self, client: &Client, ctx: &QueryContext) -> Result<Vec<f64>, EntError> {
        self.single("floats", client, ctx).await
    }

    pub async fn bools(self, client: &Client, ctx: &QueryContext) -> Result<Vec<bool>, EntError> {
        self.single("bools", client, ctx).await
    }
}
