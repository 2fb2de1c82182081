//! Owned snapshot of the GraphQL fields a caller requested.
//!
//! Eager loading only looks at field names, so the selection is copied out of
//! async-graphql's borrowed `SelectionField` tree once per resolver. Fragments
//! and inline fragments are flattened by async-graphql before we see them.

use async_graphql::context::SelectionField;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldSelection {
    pub name: String,
    pub children: Vec<FieldSelection>,
}

impl FieldSelection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Builder helper, mostly for tests.
    pub fn with_child(mut self, child: FieldSelection) -> Self {
        self.children.push(child);
        self
    }

    pub fn from_graphql(field: &SelectionField<'_>) -> Self {
        Self {
            name: field.name().to_string(),
            children: field
                .selection_set()
                .map(|child| Self::from_graphql(&child))
                .collect(),
        }
    }

    /// Direct child by GraphQL field name.
    pub fn field(&self, name: &str) -> Option<&FieldSelection> {
        self.children.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Walk down `path`, e.g. `["edges", "node"]` for a connection field.
    pub fn field_for_path(&self, path: &[&str]) -> Option<&FieldSelection> {
        path.iter()
            .try_fold(self, |field, name| field.field(name))
    }
}
