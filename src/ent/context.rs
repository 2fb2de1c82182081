//! Request-scoped query context: cancellation plus the optional GraphQL field
//! selection that drives eager loading.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::collect::FieldSelection;
use super::error::EntError;

/// Carried through every query builder call.
///
/// Cloning is cheap; clones share the cancellation token.
#[derive(Clone, Debug, Default)]
pub struct QueryContext {
    cancel: CancellationToken,
    fields: Option<Arc<FieldSelection>>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from an async-graphql resolver context, capturing the
    /// selection of the field being resolved.
    pub fn from_graphql(ctx: &async_graphql::Context<'_>) -> Self {
        Self {
            cancel: ctx
                .data_opt::<CancellationToken>()
                .cloned()
                .unwrap_or_default(),
            fields: Some(Arc::new(FieldSelection::from_graphql(&ctx.field()))),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_fields(mut self, fields: FieldSelection) -> Self {
        self.fields = Some(Arc::new(fields));
        self
    }

    /// Same cancellation, no field selection.
    pub fn without_fields(&self) -> Self {
        Self {
            cancel: self.cancel.clone(),
            fields: None,
        }
    }

    pub fn fields(&self) -> Option<&FieldSelection> {
        self.fields.as_deref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` to completion unless the context is cancelled first.
    pub async fn run<T, E, F>(&self, fut: F) -> Result<T, EntError>
    where
        F: Future<Output = Result<T, E>>,
        EntError: From<E>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(EntError::Cancelled),
            result = fut => result.map_err(EntError::from),
        }
    }
}
