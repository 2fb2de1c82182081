//! Core traits implemented by every entity type.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::client::Client;
use super::collect::FieldSelection;
use super::context::QueryContext;
use super::error::EntError;
use super::schema::TableSchema;

/// A row type stored in its own table and addressable by integer id.
pub trait Entity: Sized + Send + Sync + Clone + Unpin + 'static {
    /// Database table name
    const TABLE: &'static str;
    /// Lowercase label used in not-found messages ("work order")
    const LABEL: &'static str;
    /// Exported GraphQL/node type name ("WorkOrder")
    const TYPE_NAME: &'static str;
    /// Columns other than `id`, in select order
    const SCHEMA: TableSchema;

    /// Eager-load instructions attached to a query of this entity.
    type With: EagerLoad<Self>;

    fn id(&self) -> i64;

    /// Hydrate a record from a row selected with `SCHEMA.column_names()`.
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error>;
}

/// Edges to fetch alongside a page of entities.
#[async_trait]
pub trait EagerLoad<E: Entity>: Default + Clone + Send + Sync {
    /// Enable edges named in the sub-selection of a node field.
    fn collect(&mut self, fields: &FieldSelection);

    fn is_empty(&self) -> bool;

    /// Batch-load every requested edge for `nodes` and attach the results.
    async fn load(
        &self,
        client: &Client,
        ctx: &QueryContext,
        nodes: &mut [E],
    ) -> Result<(), EntError>;
}

/// Decode a text column into a string-backed enum.
pub(crate) fn decode_enum<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = EntError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: EntError| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

/// Result slot of an edge: either never requested, or loaded (possibly empty).
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeSlot<T> {
    NotLoaded,
    Loaded(T),
}

impl<T> Default for EdgeSlot<T> {
    fn default() -> Self {
        EdgeSlot::NotLoaded
    }
}

impl<T> EdgeSlot<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, EdgeSlot::Loaded(_))
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            EdgeSlot::Loaded(value) => Some(value),
            EdgeSlot::NotLoaded => None,
        }
    }

    /// The loaded value, or `NotLoaded` naming `edge`.
    pub fn get(&self, edge: &str) -> Result<&T, EntError> {
        self.loaded()
            .ok_or_else(|| EntError::NotLoaded(edge.to_string()))
    }

    pub fn set(&mut self, value: T) {
        *self = EdgeSlot::Loaded(value);
    }
}

impl<T> EdgeSlot<Option<T>> {
    /// To-one accessor: an unset neighbour is reported as not found.
    pub fn get_one(&self, edge: &str, label: &str) -> Result<&T, EntError> {
        self.get(edge)?
            .as_ref()
            .ok_or_else(|| EntError::not_found(label))
    }
}

impl<T> EdgeSlot<Vec<T>> {
    /// Mark as loaded with no neighbours unless already loaded.
    pub fn ensure_loaded(&mut self) -> &mut Vec<T> {
        if let EdgeSlot::NotLoaded = self {
            *self = EdgeSlot::Loaded(Vec::new());
        }
        match self {
            EdgeSlot::Loaded(values) => values,
            EdgeSlot::NotLoaded => unreachable!(),
        }
    }

    pub fn push(&mut self, value: T) {
        self.ensure_loaded().push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_slot_not_loaded() {
        let slot: EdgeSlot<Vec<i64>> = EdgeSlot::default();
        assert!(!slot.is_loaded());
        assert!(slot.get("activities").unwrap_err().is_not_loaded());
    }

    #[test]
    fn test_edge_slot_loaded_empty() {
        let mut slot: EdgeSlot<Vec<i64>> = EdgeSlot::default();
        slot.ensure_loaded();
        assert!(slot.is_loaded());
        assert!(slot.get("activities").unwrap().is_empty());
    }

    #[test]
    fn test_to_one_unset_is_not_found() {
        let slot: EdgeSlot<Option<i64>> = EdgeSlot::Loaded(None);
        let err = slot.get_one("owner", "user").unwrap_err();
        assert!(err.is_not_found());

        let slot: EdgeSlot<Option<i64>> = EdgeSlot::Loaded(Some(3));
        assert_eq!(*slot.get_one("owner", "user").unwrap(), 3);
    }
}
