//! Automatic schema synchronization from entity definitions
//!
//! This module provides ORM-like auto-migration capabilities:
//! - Creates missing entity and join tables automatically
//! - Adds missing columns automatically
//! - Registers every entity table in the type table, in declaration order
//! - Seeds each table's AUTOINCREMENT counter at `index << 32` so stored ids
//!   decode to their table through the type table
//! - Does NOT handle column renames or type changes (requires DB wipe)

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::ent::{ColumnDef, JoinTableSchema, TableSchema};
use crate::entities;

/// Result of a schema sync operation
#[derive(Debug, Default)]
pub struct SchemaSyncResult {
    pub tables_created: Vec<String>,
    pub columns_added: Vec<(String, String)>, // (table, column)
    pub tables_registered: Vec<String>,
    pub errors: Vec<String>,
}

impl SchemaSyncResult {
    fn merge(&mut self, other: SchemaSyncResult) {
        self.tables_created.extend(other.tables_created);
        self.columns_added.extend(other.columns_added);
        self.tables_registered.extend(other.tables_registered);
        self.errors.extend(other.errors);
    }
}

/// Check if a table exists in the database
async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool, sqlx::Error> {
    let result: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table_name)
            .fetch_optional(pool)
            .await?;

    Ok(result.is_some())
}

/// Get existing columns for a table
async fn get_table_columns(
    pool: &SqlitePool,
    table_name: &str,
) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(i32, String, String, i32, Option<String>, i32)> =
        sqlx::query_as(&format!("PRAGMA table_info({})", table_name))
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().map(|(_, name, _, _, _, _)| name).collect())
}

/// Sync a single entity table to the database
pub async fn sync_table(
    pool: &SqlitePool,
    schema: &TableSchema,
) -> Result<SchemaSyncResult, sqlx::Error> {
    let mut result = SchemaSyncResult::default();
    let table_name = schema.name;

    if !table_exists(pool, table_name).await? {
        let create_sql = schema.create_table_sql();
        debug!("Creating table {}: {}", table_name, create_sql);

        match sqlx::query(&create_sql).execute(pool).await {
            Ok(_) => {
                info!("Created table: {}", table_name);
                result.tables_created.push(table_name.to_string());
            }
            Err(e) => {
                let msg = format!("Failed to create table {}: {}", table_name, e);
                warn!("{}", msg);
                result.errors.push(msg);
            }
        }
    } else {
        let existing_columns = get_table_columns(pool, table_name).await?;

        for col_def in schema.columns {
            if existing_columns.iter().any(|c| c == col_def.name) {
                continue;
            }

            let alter_sql = generate_add_column_sql(table_name, col_def);
            debug!("Adding column to {}: {}", table_name, alter_sql);

            match sqlx::query(&alter_sql).execute(pool).await {
                Ok(_) => {
                    info!("Added column {}.{}", table_name, col_def.name);
                    result
                        .columns_added
                        .push((table_name.to_string(), col_def.name.to_string()));
                }
                Err(e) => {
                    let msg = format!(
                        "Failed to add column {}.{}: {}",
                        table_name, col_def.name, e
                    );
                    warn!("{}", msg);
                    result.errors.push(msg);
                }
            }
        }
    }

    Ok(result)
}

/// Generate ALTER TABLE ADD COLUMN SQL
fn generate_add_column_sql(table_name: &str, col: &ColumnDef) -> String {
    let mut sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        table_name, col.name, col.sql_type
    );

    // Note: SQLite has restrictions on ALTER TABLE ADD COLUMN:
    // - Cannot add PRIMARY KEY columns
    // - Cannot add NOT NULL columns without a default

    if let Some(default) = col.default {
        sql.push_str(&format!(" DEFAULT {}", default));
    } else if !col.nullable {
        let default_val = match col.sql_type {
            "TEXT" => "''",
            "INTEGER" | "BOOLEAN" => "0",
            "REAL" => "0.0",
            _ => "''",
        };
        sql.push_str(&format!(" NOT NULL DEFAULT {}", default_val));
    }

    if let Some(table) = col.references {
        sql.push_str(&format!(" REFERENCES {}(id) ON DELETE SET NULL", table));
    }

    sql
}

async fn sync_join_table(pool: &SqlitePool, join: &JoinTableSchema) -> SchemaSyncResult {
    let mut result = SchemaSyncResult::default();
    let existed = table_exists(pool, join.name).await.unwrap_or(false);

    if let Err(e) = sqlx::query(&join.create_table_sql()).execute(pool).await {
        let msg = format!("Failed to create join table {}: {}", join.name, e);
        warn!("{}", msg);
        result.errors.push(msg);
    } else if !existed {
        info!("Created table: {}", join.name);
        result.tables_created.push(join.name.to_string());
    }
    result
}

/// Create the type table and append any entity table it does not list yet.
/// Returns the directory in id order.
pub async fn register_types(
    pool: &SqlitePool,
    type_table: &str,
    tables: &[TableSchema],
) -> Result<(Vec<String>, Vec<String>), sqlx::Error> {
    let create_sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  id INTEGER PRIMARY KEY AUTOINCREMENT,\n  type TEXT NOT NULL UNIQUE\n)",
        type_table
    );
    sqlx::query(&create_sql).execute(pool).await?;

    let mut registered = Vec::new();
    let insert_sql = format!("INSERT OR IGNORE INTO {} (type) VALUES (?)", type_table);
    for schema in tables {
        let outcome = sqlx::query(&insert_sql)
            .bind(schema.name)
            .execute(pool)
            .await?;
        if outcome.rows_affected() > 0 {
            registered.push(schema.name.to_string());
        }
    }

    let directory: Vec<String> =
        sqlx::query_scalar(&format!("SELECT type FROM {} ORDER BY id ASC", type_table))
            .fetch_all(pool)
            .await?;

    Ok((directory, registered))
}

/// Start the id counter of the table at `index` at `index << 32` unless the
/// table already allocated ids.
async fn seed_id_range(pool: &SqlitePool, table: &str, index: usize) -> Result<bool, sqlx::Error> {
    let start = (index as i64) << 32;
    let outcome = sqlx::query(
        "INSERT INTO sqlite_sequence (name, seq) SELECT ?, ? \
         WHERE NOT EXISTS (SELECT 1 FROM sqlite_sequence WHERE name = ?)",
    )
    .bind(table)
    .bind(start)
    .bind(table)
    .execute(pool)
    .await?;

    Ok(outcome.rows_affected() > 0)
}

/// Sync all entity tables to the database.
///
/// This should be called at startup to ensure all entity tables exist, have
/// the correct columns and allocate globally decodable ids.
pub async fn sync_schema(pool: &SqlitePool, type_table: &str) -> SchemaSyncResult {
    let mut total_result = SchemaSyncResult::default();
    let tables = entities::all_tables();

    for schema in &tables {
        match sync_table(pool, schema).await {
            Ok(result) => total_result.merge(result),
            Err(e) => total_result
                .errors
                .push(format!("Error syncing {}: {}", schema.name, e)),
        }
    }

    for join in &entities::join_tables() {
        total_result.merge(sync_join_table(pool, join).await);
    }

    let directory = match register_types(pool, type_table, &tables).await {
        Ok((directory, registered)) => {
            total_result.tables_registered.extend(registered);
            directory
        }
        Err(e) => {
            let msg = format!("Failed to register types in {}: {}", type_table, e);
            warn!("{}", msg);
            total_result.errors.push(msg);
            return total_result;
        }
    };

    for (index, table) in directory.iter().enumerate() {
        match seed_id_range(pool, table, index).await {
            Ok(true) => debug!(table = %table, index, "Seeded id range"),
            Ok(false) => {}
            Err(e) => {
                let msg = format!("Failed to seed id range of {}: {}", table, e);
                warn!("{}", msg);
                total_result.errors.push(msg);
            }
        }
    }

    info!(
        tables_created = total_result.tables_created.len(),
        columns_added = total_result.columns_added.len(),
        errors = total_result.errors.len(),
        "Schema sync complete"
    );

    total_result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_column_sql() {
        let col = ColumnDef::new("priority", "TEXT").default("'NONE'");
        assert_eq!(
            generate_add_column_sql("work_orders", &col),
            "ALTER TABLE work_orders ADD COLUMN priority TEXT DEFAULT 'NONE'"
        );

        let col = ColumnDef::new("name", "TEXT");
        assert_eq!(
            generate_add_column_sql("work_orders", &col),
            "ALTER TABLE work_orders ADD COLUMN name TEXT NOT NULL DEFAULT ''"
        );

        let col = ColumnDef::foreign_key("activity_author", "users");
        assert_eq!(
            generate_add_column_sql("activities", &col),
            "ALTER TABLE activities ADD COLUMN activity_author INTEGER REFERENCES users(id) ON DELETE SET NULL"
        );
    }

    #[tokio::test]
    async fn test_sync_seeds_id_ranges() {
        let pool = crate::db::Database::connect_in_memory().await.unwrap().into_pool();
        let result = sync_schema(&pool, "ent_types").await;
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.tables_registered.len(), 4);

        let seq: i64 =
            sqlx::query_scalar("SELECT seq FROM sqlite_sequence WHERE name = 'work_orders'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(seq, 2 << 32);

        // Second run is a no-op
        let again = sync_schema(&pool, "ent_types").await;
        assert!(again.tables_created.is_empty());
        assert!(again.tables_registered.is_empty());
    }
}
