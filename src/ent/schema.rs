//! Table and column definitions used by schema sync and SQL generation.

/// Column definition for schema generation.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    /// Column name in the database
    pub name: &'static str,
    /// SQLite column type (TEXT, INTEGER, REAL, BLOB)
    pub sql_type: &'static str,
    /// Whether the column can be NULL
    pub nullable: bool,
    /// Default value expression (e.g., "'ACTIVE'")
    pub default: Option<&'static str>,
    /// Referenced table for foreign-key columns
    pub references: Option<&'static str>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            nullable: false,
            default: None,
            references: None,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn default(mut self, expr: &'static str) -> Self {
        self.default = Some(expr);
        self
    }

    /// Nullable foreign key to `table(id)`, cleared when the target is deleted.
    pub const fn foreign_key(name: &'static str, table: &'static str) -> Self {
        Self {
            name,
            sql_type: "INTEGER",
            nullable: true,
            default: None,
            references: Some(table),
        }
    }

    /// Generate the column definition SQL
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);

        if !self.nullable {
            sql.push_str(" NOT NULL");
        }

        if let Some(default) = self.default {
            sql.push_str(&format!(" DEFAULT {}", default));
        }

        if let Some(table) = self.references {
            sql.push_str(&format!(" REFERENCES {}(id) ON DELETE SET NULL", table));
        }

        sql
    }
}

/// Schema of an entity table. The `id` primary key is implicit.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

impl TableSchema {
    /// Generate CREATE TABLE IF NOT EXISTS SQL
    pub fn create_table_sql(&self) -> String {
        let mut defs = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
        defs.extend(self.columns.iter().map(ColumnDef::to_sql));

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            self.name,
            defs.join(",\n  ")
        )
    }

    /// Column names in select order, `id` first.
    pub fn column_names(&self) -> Vec<&'static str> {
        std::iter::once("id")
            .chain(self.columns.iter().map(|c| c.name))
            .collect()
    }
}

/// Join table backing a many-to-many edge.
#[derive(Debug, Clone, Copy)]
pub struct JoinTableSchema {
    pub name: &'static str,
    /// Column holding the id of the edge owner (e.g. the group)
    pub owner_column: &'static str,
    pub owner_table: &'static str,
    /// Column holding the id of the edge target (e.g. the member)
    pub target_column: &'static str,
    pub target_table: &'static str,
}

impl JoinTableSchema {
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {name} (\n  {owner} INTEGER NOT NULL REFERENCES {owner_table}(id) ON DELETE CASCADE,\n  {target} INTEGER NOT NULL REFERENCES {target_table}(id) ON DELETE CASCADE,\n  PRIMARY KEY ({owner}, {target})\n)",
            name = self.name,
            owner = self.owner_column,
            owner_table = self.owner_table,
            target = self.target_column,
            target_table = self.target_table,
        )
    }
}
