//! Row updates used by the entity update builders.
//!
//! An [`UpdateBuilder`] collects column assignments and edge changes. Saving
//! it selects the ids matching the builder's query, then applies every change
//! to exactly those rows inside one transaction.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use super::client::Client;
use super::context::QueryContext;
use super::entity::Entity;
use super::error::EntError;
use super::insert::insert_edges;
use super::predicate::{Predicate, SqlValue};
use super::query::EntityQuery;
use super::schema::JoinTableSchema;

/// A change to the edges of the updated rows.
#[derive(Debug, Clone)]
enum EdgeChange {
    /// Point `column` of the neighbour rows `ids` at the updated row.
    Attach {
        table: &'static str,
        column: &'static str,
        ids: Vec<i64>,
    },
    /// Null out `column` of the neighbour rows `ids` that point at an updated row.
    Detach {
        table: &'static str,
        column: &'static str,
        ids: Vec<i64>,
    },
    /// Add join rows between every updated row and `ids`.
    Link {
        join: JoinTableSchema,
        inverse: bool,
        ids: Vec<i64>,
    },
    Unlink {
        join: JoinTableSchema,
        inverse: bool,
        ids: Vec<i64>,
    },
}

#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    table: &'static str,
    sets: Vec<(&'static str, SqlValue)>,
    edges: Vec<EdgeChange>,
}

impl UpdateBuilder {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            sets: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn set(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.sets.retain(|(c, _)| *c != column);
        self.sets.push((column, value.into()));
        self
    }

    /// Set the column to NULL.
    pub fn clear(self, column: &'static str) -> Self {
        self.set(column, SqlValue::Null)
    }

    /// Attach one-to-many neighbours through their foreign key `column`.
    pub fn attach(mut self, table: &'static str, column: &'static str, mut ids: Vec<i64>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        if !ids.is_empty() {
            self.edges.push(EdgeChange::Attach { table, column, ids });
        }
        self
    }

    pub fn detach(mut self, table: &'static str, column: &'static str, ids: Vec<i64>) -> Self {
        if !ids.is_empty() {
            self.edges.push(EdgeChange::Detach { table, column, ids });
        }
        self
    }

    /// Link many-to-many neighbours. `inverse` is set when the updated rows
    /// sit in the join table's target column.
    pub fn link(mut self, join: JoinTableSchema, inverse: bool, ids: Vec<i64>) -> Self {
        if !ids.is_empty() {
            self.edges.push(EdgeChange::Link { join, inverse, ids });
        }
        self
    }

    pub fn unlink(mut self, join: JoinTableSchema, inverse: bool, ids: Vec<i64>) -> Self {
        if !ids.is_empty() {
            self.edges.push(EdgeChange::Unlink { join, inverse, ids });
        }
        self
    }

    /// Render the column UPDATE for the rows matching `predicate`.
    pub fn to_sql(&self, predicate: &Predicate) -> (String, Vec<SqlValue>) {
        let mut values: Vec<SqlValue> = self.sets.iter().map(|(_, v)| v.clone()).collect();
        let assignments: Vec<String> = self.sets.iter().map(|(c, _)| format!("{} = ?", c)).collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.table,
            assignments.join(", "),
            predicate.to_sql(&mut values)
        );
        (sql, values)
    }

    /// Apply the changes to the rows `ids`.
    pub async fn execute(&self, conn: &mut SqliteConnection, ids: &[i64]) -> Result<(), EntError> {
        if ids.is_empty() {
            return Ok(());
        }

        if !self.sets.is_empty() {
            let (sql, values) = self.to_sql(&Predicate::id_in(ids.iter().copied()));
            debug!(sql = %sql, table = self.table, rows = ids.len(), "Executing update");
            let mut query = sqlx::query(&sql);
            for value in &values {
                query = value.bind_to_query(query);
            }
            query.execute(&mut *conn).await?;
        }

        for change in &self.edges {
            apply_edge_change(conn, change, ids).await?;
        }

        Ok(())
    }

    /// Update every row matching `query`, returning the number of rows.
    pub async fn save<E: Entity>(
        self,
        client: &Client,
        ctx: &QueryContext,
        query: EntityQuery<E>,
    ) -> Result<usize, EntError> {
        let update = self.set("update_time", Utc::now());
        let pool = client.pool();

        ctx.run(async {
            let mut tx = pool.begin().await?;
            let ids = query.fetch_ids(&mut tx).await?;
            update.execute(&mut tx, &ids).await?;
            tx.commit().await?;
            Ok::<_, EntError>(ids.len())
        })
        .await
    }

    /// Update the row `id` and return it reloaded.
    pub async fn save_one<E: Entity>(
        self,
        client: &Client,
        ctx: &QueryContext,
        id: i64,
    ) -> Result<E, EntError> {
        let query = EntityQuery::<E>::new().where_(Predicate::id_eq(id));
        if self.save(client, ctx, query.clone()).await? == 0 {
            return Err(EntError::not_found(E::LABEL));
        }
        query.only(client, ctx).await
    }
}

async fn apply_edge_change(
    conn: &mut SqliteConnection,
    change: &EdgeChange,
    ids: &[i64],
) -> Result<(), EntError> {
    match change {
        EdgeChange::Attach {
            table,
            column,
            ids: targets,
        } => {
            let [id] = ids else {
                return Err(EntError::Constraint(format!(
                    "one-to-many edge \"{}\" cannot be attached to {} nodes",
                    column,
                    ids.len()
                )));
            };
            let mut values = vec![SqlValue::Int(*id)];
            let condition = Predicate::and([
                Predicate::id_in(targets.iter().copied()),
                Predicate::is_null(*column),
            ])
            .to_sql(&mut values);
            let sql = format!("UPDATE {} SET {} = ? WHERE {}", table, column, condition);
            debug!(sql = %sql, edges = targets.len(), "Attaching edges");

            let mut query = sqlx::query(&sql);
            for value in &values {
                query = value.bind_to_query(query);
            }
            let affected = query.execute(&mut *conn).await?.rows_affected();
            if affected != targets.len() as u64 {
                return Err(EntError::Constraint(format!(
                    "one of {:?} is already connected to a different \"{}\"",
                    targets, column
                )));
            }
        }
        EdgeChange::Detach {
            table,
            column,
            ids: targets,
        } => {
            let mut values = Vec::new();
            let condition = Predicate::and([
                Predicate::id_in(targets.iter().copied()),
                Predicate::is_in(*column, ids.iter().copied()),
            ])
            .to_sql(&mut values);
            let sql = format!("UPDATE {} SET {} = NULL WHERE {}", table, column, condition);
            debug!(sql = %sql, edges = targets.len(), "Detaching edges");

            let mut query = sqlx::query(&sql);
            for value in &values {
                query = value.bind_to_query(query);
            }
            query.execute(&mut *conn).await?;
        }
        EdgeChange::Link {
            join,
            inverse,
            ids: targets,
        } => {
            let pairs = edge_pairs(ids, targets, *inverse);
            insert_edges(conn, join, &pairs).await?;
        }
        EdgeChange::Unlink {
            join,
            inverse,
            ids: targets,
        } => {
            let pairs = edge_pairs(ids, targets, *inverse);
            delete_edges(conn, join, &pairs).await?;
        }
    }
    Ok(())
}

/// `(owner, target)` pairs between every updated row and every neighbour.
fn edge_pairs(ids: &[i64], targets: &[i64], inverse: bool) -> Vec<(i64, i64)> {
    ids.iter()
        .flat_map(|id| {
            targets
                .iter()
                .map(move |target| if inverse { (*target, *id) } else { (*id, *target) })
        })
        .collect()
}

/// Delete `(owner, target)` id pairs from a many-to-many join table.
pub async fn delete_edges(
    conn: &mut SqliteConnection,
    join: &JoinTableSchema,
    pairs: &[(i64, i64)],
) -> Result<(), sqlx::Error> {
    if pairs.is_empty() {
        return Ok(());
    }

    let sql = format!(
        "DELETE FROM {} WHERE {} = ? AND {} = ?",
        join.name, join.owner_column, join.target_column
    );
    debug!(sql = %sql, edges = pairs.len(), "Deleting edges");

    for (owner_id, target_id) in pairs {
        sqlx::query(&sql)
            .bind(*owner_id)
            .bind(*target_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}
