//! HTTP routes
//!
//! The API is GraphQL at /graphql, plus health checks.

mod graphql;
pub mod health;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db::Database;
use crate::graphql::WorkgraphSchema;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub schema: WorkgraphSchema,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .route(
            "/graphql",
            get(graphql::graphiql).post(graphql::graphql_handler),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
