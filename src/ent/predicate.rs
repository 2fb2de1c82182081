//! Predicates, orderings and bound values for entity queries.
//!
//! Predicates render to SQL fragments with positional `?` placeholders; the
//! values are collected in the same order and bound when the query executes.

use chrono::{DateTime, Utc};

/// Represents a SQL value that can be bound to a query.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Null,
}

impl SqlValue {
    /// Bind this value to a sqlx query builder
    pub fn bind_to_query<'q>(
        &'q self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Timestamp(t) => query.bind(*t),
            SqlValue::Null => query.bind(None::<String>),
        }
    }

    /// Same as [`bind_to_query`](Self::bind_to_query) for scalar queries.
    pub fn bind_to_scalar<'q, O>(
        &'q self,
        query: sqlx::query::QueryScalar<'q, sqlx::Sqlite, O, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::QueryScalar<'q, sqlx::Sqlite, O, sqlx::sqlite::SqliteArguments<'q>> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Timestamp(t) => query.bind(*t),
            SqlValue::Null => query.bind(None::<String>),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::String(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::String(s)
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        SqlValue::Int(i)
    }
}

impl From<f64> for SqlValue {
    fn from(f: f64) -> Self {
        SqlValue::Float(f)
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        SqlValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(t: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(t)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// A single WHERE condition. Multiple predicates on a query are AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(&'static str, SqlValue),
    Neq(&'static str, SqlValue),
    Gt(&'static str, SqlValue),
    Gte(&'static str, SqlValue),
    Lt(&'static str, SqlValue),
    Lte(&'static str, SqlValue),
    In(&'static str, Vec<SqlValue>),
    NotIn(&'static str, Vec<SqlValue>),
    IsNull(&'static str),
    NotNull(&'static str),
    /// Case-sensitive substring match
    Contains(&'static str, String),
    HasPrefix(&'static str, String),
    HasSuffix(&'static str, String),
    /// Case-insensitive equality
    EqualFold(&'static str, String),
    /// `column IN (SELECT select_column FROM table WHERE where_column = value)`
    InJoin {
        column: &'static str,
        table: &'static str,
        select_column: &'static str,
        where_column: &'static str,
        value: i64,
    },
    /// `column IN (SELECT select_column FROM table [WHERE predicates])`
    InSelect {
        column: &'static str,
        table: &'static str,
        select_column: &'static str,
        predicates: Vec<Predicate>,
    },
    /// `column IN (<sql>)` over a rendered sub-query and its bound values
    InQuery {
        column: &'static str,
        sql: String,
        values: Vec<SqlValue>,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn eq(column: &'static str, value: impl Into<SqlValue>) -> Self {
        Predicate::Eq(column, value.into())
    }

    pub fn neq(column: &'static str, value: impl Into<SqlValue>) -> Self {
        Predicate::Neq(column, value.into())
    }

    pub fn gt(column: &'static str, value: impl Into<SqlValue>) -> Self {
        Predicate::Gt(column, value.into())
    }

    pub fn gte(column: &'static str, value: impl Into<SqlValue>) -> Self {
        Predicate::Gte(column, value.into())
    }

    pub fn lt(column: &'static str, value: impl Into<SqlValue>) -> Self {
        Predicate::Lt(column, value.into())
    }

    pub fn lte(column: &'static str, value: impl Into<SqlValue>) -> Self {
        Predicate::Lte(column, value.into())
    }

    pub fn is_in<V: Into<SqlValue>>(
        column: &'static str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Predicate::In(column, values.into_iter().map(Into::into).collect())
    }

    pub fn not_in<V: Into<SqlValue>>(
        column: &'static str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Predicate::NotIn(column, values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(column: &'static str) -> Self {
        Predicate::IsNull(column)
    }

    pub fn not_null(column: &'static str) -> Self {
        Predicate::NotNull(column)
    }

    pub fn contains(column: &'static str, substr: impl Into<String>) -> Self {
        Predicate::Contains(column, substr.into())
    }

    pub fn has_prefix(column: &'static str, prefix: impl Into<String>) -> Self {
        Predicate::HasPrefix(column, prefix.into())
    }

    pub fn has_suffix(column: &'static str, suffix: impl Into<String>) -> Self {
        Predicate::HasSuffix(column, suffix.into())
    }

    pub fn equal_fold(column: &'static str, value: impl Into<String>) -> Self {
        Predicate::EqualFold(column, value.into())
    }

    pub fn in_select(
        column: &'static str,
        table: &'static str,
        select_column: &'static str,
        predicates: impl IntoIterator<Item = Predicate>,
    ) -> Self {
        Predicate::InSelect {
            column,
            table,
            select_column,
            predicates: predicates.into_iter().collect(),
        }
    }

    pub fn and(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::And(predicates.into_iter().collect())
    }

    pub fn or(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Or(predicates.into_iter().collect())
    }

    pub fn id_eq(id: i64) -> Self {
        Predicate::eq("id", id)
    }

    pub fn id_gt(id: i64) -> Self {
        Predicate::gt("id", id)
    }

    pub fn id_lt(id: i64) -> Self {
        Predicate::lt("id", id)
    }

    pub fn id_in(ids: impl IntoIterator<Item = i64>) -> Self {
        Predicate::is_in("id", ids)
    }

    /// Render the SQL fragment, pushing bound values onto `values`.
    pub fn to_sql(&self, values: &mut Vec<SqlValue>) -> String {
        match self {
            Predicate::Eq(column, value) => compare(column, "=", value, values),
            Predicate::Neq(column, value) => compare(column, "<>", value, values),
            Predicate::Gt(column, value) => compare(column, ">", value, values),
            Predicate::Gte(column, value) => compare(column, ">=", value, values),
            Predicate::Lt(column, value) => compare(column, "<", value, values),
            Predicate::Lte(column, value) => compare(column, "<=", value, values),
            // An empty set matches nothing.
            Predicate::In(_, list) if list.is_empty() => "1 = 0".to_string(),
            Predicate::In(column, list) => {
                values.extend(list.iter().cloned());
                format!("{} IN ({})", column, placeholders(list.len()))
            }
            Predicate::NotIn(_, list) if list.is_empty() => "1 = 1".to_string(),
            Predicate::NotIn(column, list) => {
                values.extend(list.iter().cloned());
                format!("{} NOT IN ({})", column, placeholders(list.len()))
            }
            Predicate::IsNull(column) => format!("{} IS NULL", column),
            Predicate::NotNull(column) => format!("{} IS NOT NULL", column),
            Predicate::Contains(column, substr) => {
                values.push(SqlValue::String(substr.clone()));
                format!("INSTR({}, ?) > 0", column)
            }
            Predicate::HasPrefix(column, prefix) => {
                values.push(SqlValue::String(prefix.clone()));
                format!("INSTR({}, ?) = 1", column)
            }
            Predicate::HasSuffix(column, suffix) => {
                values.push(SqlValue::String(suffix.clone()));
                values.push(SqlValue::String(suffix.clone()));
                format!("SUBSTR({0}, LENGTH({0}) - LENGTH(?) + 1) = ?", column)
            }
            Predicate::EqualFold(column, value) => {
                values.push(SqlValue::String(value.clone()));
                format!("LOWER({}) = LOWER(?)", column)
            }
            Predicate::InJoin {
                column,
                table,
                select_column,
                where_column,
                value,
            } => {
                values.push(SqlValue::Int(*value));
                format!(
                    "{} IN (SELECT {} FROM {} WHERE {} = ?)",
                    column, select_column, table, where_column
                )
            }
            Predicate::InSelect {
                column,
                table,
                select_column,
                predicates,
            } => {
                let mut sql = format!("{} IN (SELECT {} FROM {}", column, select_column, table);
                if !predicates.is_empty() {
                    sql.push_str(" WHERE ");
                    sql.push_str(&conjunction(predicates, values));
                }
                sql.push(')');
                sql
            }
            Predicate::InQuery {
                column,
                sql,
                values: bound,
            } => {
                values.extend(bound.iter().cloned());
                format!("{} IN ({})", column, sql)
            }
            Predicate::And(list) if list.is_empty() => "1 = 1".to_string(),
            Predicate::And(list) => format!("({})", conjunction(list, values)),
            Predicate::Or(list) if list.is_empty() => "1 = 0".to_string(),
            Predicate::Or(list) => {
                let parts: Vec<String> = list.iter().map(|p| p.to_sql(values)).collect();
                format!("({})", parts.join(" OR "))
            }
            Predicate::Not(inner) => format!("NOT ({})", inner.to_sql(values)),
        }
    }
}

impl std::ops::Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Self::Output {
        Predicate::Not(Box::new(self))
    }
}

fn compare(column: &str, op: &str, value: &SqlValue, values: &mut Vec<SqlValue>) -> String {
    values.push(value.clone());
    format!("{} {} ?", column, op)
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Render `predicates` joined with AND, without surrounding parentheses.
pub(crate) fn conjunction(predicates: &[Predicate], values: &mut Vec<SqlValue>) -> String {
    let parts: Vec<String> = predicates.iter().map(|p| p.to_sql(values)).collect();
    parts.join(" AND ")
}

/// Sort direction for ORDER BY clauses.
#[derive(async_graphql::Enum, Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum OrderDirection {
    /// Ascending order (A-Z, 1-9, oldest-newest)
    #[default]
    Asc,
    /// Descending order (Z-A, 9-1, newest-oldest)
    Desc,
}

impl OrderDirection {
    /// Convert to SQL order string
    pub fn to_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub direction: OrderDirection,
}

impl Order {
    pub fn asc(column: &'static str) -> Self {
        Self {
            column,
            direction: OrderDirection::Asc,
        }
    }

    pub fn desc(column: &'static str) -> Self {
        Self {
            column,
            direction: OrderDirection::Desc,
        }
    }

    pub fn to_sql(&self) -> String {
        format!("{} {}", self.column, self.direction.to_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_predicate() {
        let mut values = Vec::new();
        assert_eq!(Predicate::id_eq(5).to_sql(&mut values), "id = ?");
        assert_eq!(values, vec![SqlValue::Int(5)]);
    }

    #[test]
    fn test_in_predicate() {
        let mut values = Vec::new();
        let sql = Predicate::id_in([1, 2, 3]).to_sql(&mut values);
        assert_eq!(sql, "id IN (?, ?, ?)");
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn test_empty_in_matches_nothing() {
        let mut values = Vec::new();
        let sql = Predicate::id_in(Vec::new()).to_sql(&mut values);
        assert_eq!(sql, "1 = 0");
        assert!(values.is_empty());
    }

    #[test]
    fn test_in_join_predicate() {
        let mut values = Vec::new();
        let sql = Predicate::InJoin {
            column: "id",
            table: "users_group_members",
            select_column: "user_id",
            where_column: "users_group_id",
            value: 9,
        }
        .to_sql(&mut values);
        assert_eq!(
            sql,
            "id IN (SELECT user_id FROM users_group_members WHERE users_group_id = ?)"
        );
        assert_eq!(values, vec![SqlValue::Int(9)]);
    }

    fn render(predicate: Predicate) -> (String, Vec<SqlValue>) {
        let mut values = Vec::new();
        let sql = predicate.to_sql(&mut values);
        (sql, values)
    }

    #[test]
    fn test_comparison_predicates() {
        assert_eq!(render(Predicate::neq("status", "DONE")).0, "status <> ?");
        assert_eq!(render(Predicate::gte("id", 4)).0, "id >= ?");
        assert_eq!(
            render(Predicate::lte("id", 9)),
            ("id <= ?".to_string(), vec![SqlValue::Int(9)])
        );
    }

    #[test]
    fn test_not_in_predicate() {
        let (sql, values) = render(Predicate::not_in("status", ["DONE", "PLANNED"]));
        assert_eq!(sql, "status NOT IN (?, ?)");
        assert_eq!(values.len(), 2);

        // Excluding nothing keeps every row
        assert_eq!(render(Predicate::not_in("id", Vec::<i64>::new())).0, "1 = 1");
    }

    #[test]
    fn test_string_predicates() {
        let (sql, values) = render(Predicate::contains("name", "tow"));
        assert_eq!(sql, "INSTR(name, ?) > 0");
        assert_eq!(values, vec![SqlValue::String("tow".into())]);

        assert_eq!(render(Predicate::has_prefix("name", "wo-")).0, "INSTR(name, ?) = 1");

        let (sql, values) = render(Predicate::has_suffix("email", "@example.com"));
        assert_eq!(sql, "SUBSTR(email, LENGTH(email) - LENGTH(?) + 1) = ?");
        assert_eq!(values.len(), 2);

        assert_eq!(
            render(Predicate::equal_fold("email", "A@Example.com")).0,
            "LOWER(email) = LOWER(?)"
        );
    }

    #[test]
    fn test_combinators_nest_with_parentheses() {
        let (sql, values) = render(Predicate::or([
            Predicate::and([Predicate::id_gt(1), Predicate::id_lt(5)]),
            !Predicate::is_null("description"),
        ]));
        assert_eq!(sql, "((id > ? AND id < ?) OR NOT (description IS NULL))");
        assert_eq!(values, vec![SqlValue::Int(1), SqlValue::Int(5)]);
    }

    #[test]
    fn test_empty_combinators() {
        assert_eq!(render(Predicate::and([])).0, "1 = 1");
        assert_eq!(render(Predicate::or([])).0, "1 = 0");
        assert_eq!(render(!Predicate::or([])).0, "NOT (1 = 0)");
    }

    #[test]
    fn test_in_select_predicate() {
        let (sql, values) = render(Predicate::in_select(
            "activity_author",
            "users",
            "id",
            [Predicate::eq("status", "ACTIVE")],
        ));
        assert_eq!(
            sql,
            "activity_author IN (SELECT id FROM users WHERE status = ?)"
        );
        assert_eq!(values, vec![SqlValue::String("ACTIVE".into())]);

        let (sql, _) = render(Predicate::in_select("id", "users_group_members", "user_id", []));
        assert_eq!(sql, "id IN (SELECT user_id FROM users_group_members)");
    }

    #[test]
    fn test_in_query_keeps_value_order() {
        let (sql, values) = render(Predicate::and([
            Predicate::eq("role", "ADMIN"),
            Predicate::InQuery {
                column: "id",
                sql: "SELECT activity_author FROM activities WHERE id > ?".into(),
                values: vec![SqlValue::Int(3)],
            },
        ]));
        assert_eq!(
            sql,
            "(role = ? AND id IN (SELECT activity_author FROM activities WHERE id > ?))"
        );
        assert_eq!(
            values,
            vec![SqlValue::String("ADMIN".into()), SqlValue::Int(3)]
        );
    }

    #[test]
    fn test_option_into_null() {
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some("x")), SqlValue::String("x".into()));
    }

    #[test]
    fn test_order_sql() {
        assert_eq!(Order::desc("id").to_sql(), "id DESC");
        assert_eq!(Order::asc("name").to_sql(), "name ASC");
    }
}
