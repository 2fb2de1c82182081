//! Row inserts used by the entity create builders.

use sqlx::SqliteConnection;
use tracing::debug;

use super::predicate::SqlValue;
use super::schema::JoinTableSchema;

/// Column/value pairs for a single INSERT.
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: &'static str,
    columns: Vec<&'static str>,
    values: Vec<SqlValue>,
}

impl InsertBuilder {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn set(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.columns.push(column);
        self.values.push(value.into());
        self
    }

    pub fn to_sql(&self) -> String {
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.columns.join(", "),
            placeholders
        )
    }

    /// Insert the row and return its id.
    pub async fn execute(&self, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
        let sql = self.to_sql();
        debug!(sql = %sql, table = self.table, "Executing insert");

        let mut query = sqlx::query(&sql);
        for value in &self.values {
            query = value.bind_to_query(query);
        }

        let result = query.execute(&mut *conn).await?;
        Ok(result.last_insert_rowid())
    }
}

/// Insert `(owner, target)` id pairs into a many-to-many join table.
pub async fn insert_edges(
    conn: &mut SqliteConnection,
    join: &JoinTableSchema,
    pairs: &[(i64, i64)],
) -> Result<(), sqlx::Error> {
    if pairs.is_empty() {
        return Ok(());
    }

    let sql = format!(
        "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?, ?)",
        join.name, join.owner_column, join.target_column
    );
    debug!(sql = %sql, edges = pairs.len(), "Inserting edges");

    for (owner_id, target_id) in pairs {
        sqlx::query(&sql)
            .bind(*owner_id)
            .bind(*target_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}
