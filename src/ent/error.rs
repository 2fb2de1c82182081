//! Error taxonomy of the ORM layer.

use async_graphql::ErrorExtensions;
use thiserror::Error;

/// Returned when a lookup by id, by `first`/`only`, or by a table-index decode
/// found nothing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("ent: {label} not found")]
pub struct NotFoundError {
    pub label: String,
}

impl NotFoundError {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EntError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// A global id or table name could not be mapped to an entity loader.
    #[error("cannot resolve {what}: {source}")]
    Unresolved {
        what: String,
        #[source]
        source: NotFoundError,
    },

    #[error("ent: missing required field \"{0}\"")]
    MissingField(&'static str),

    #[error("ent: {0} not singular")]
    NotSingular(String),

    #[error("ent: {0} edge was not loaded")]
    NotLoaded(String),

    #[error("ent: invalid pagination parameters")]
    InvalidPagination,

    #[error("{0} is not a string")]
    CursorType(String),

    #[error("decode cursor: {0}")]
    CursorDecode(String),

    #[error("ent: operation cancelled")]
    Cancelled,

    #[error("unexpected foreign-key \"{column}\" returned {id}")]
    UnexpectedForeignKey { column: &'static str, id: i64 },

    #[error("foreign-key \"{column}\" is nil for node {id}")]
    NilForeignKey { column: &'static str, id: i64 },

    #[error("ent: invalid value {value:?} for enum {enum_name}")]
    InvalidEnumValue {
        enum_name: &'static str,
        value: String,
    },

    #[error("ent: {0} is not achievable when selecting more than 1 field")]
    MultipleFields(&'static str),

    #[error("ent: constraint failed: {0}")]
    Constraint(String),

    #[error("ent: count: {0}")]
    Count(#[source] sqlx::Error),

    #[error("ent: check existence: {0}")]
    Exist(#[source] Box<EntError>),

    #[error("ent: encode field: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl EntError {
    pub fn not_found(label: impl Into<String>) -> Self {
        Self::NotFound(NotFoundError::new(label))
    }

    /// True for zero-row lookups and unresolvable node ids. Singularity
    /// violations are not "not found".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) | Self::Unresolved { .. } => true,
            Self::Exist(inner) => inner.is_not_found(),
            _ => false,
        }
    }

    pub fn is_not_singular(&self) -> bool {
        matches!(self, Self::NotSingular(_))
    }

    pub fn is_not_loaded(&self) -> bool {
        matches!(self, Self::NotLoaded(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Client-facing error code used in GraphQL error extensions.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) | Self::Unresolved { .. } => "NOT_FOUND",
            Self::NotSingular(_) => "NOT_SINGULAR",
            Self::MissingField(_) | Self::MultipleFields(_) => "VALIDATION",
            Self::Constraint(_) => "CONSTRAINT",
            Self::InvalidPagination => "INVALID_PAGINATION",
            Self::CursorType(_) | Self::CursorDecode(_) => "INVALID_CURSOR",
            Self::Cancelled => "CANCELLED",
            _ => "INTERNAL",
        }
    }
}

impl ErrorExtensions for EntError {
    fn extend(&self) -> async_graphql::Error {
        // Database failures stay opaque to clients.
        let message = match self.code() {
            "INTERNAL" => "internal error".to_string(),
            _ => self.to_string(),
        };
        async_graphql::Error::new(message).extend_with(|_, e| e.set("code", self.code()))
    }
}
