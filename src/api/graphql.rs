use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use tokio_util::sync::CancellationToken;

use super::AppState;

/// GraphQL query handler.
///
/// Each request gets its own cancellation token. It fires when the handler
/// future is dropped, so queries of a disconnected client stop at their next
/// database await.
pub(super) async fn graphql_handler(
    State(state): State<AppState>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let token = CancellationToken::new();
    let _guard = token.clone().drop_guard();

    let request = req.into_inner().data(token);
    state.schema.execute(request).await.into()
}

pub(super) async fn graphiql(headers: HeaderMap) -> impl IntoResponse {
    let accepts_html = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);

    if accepts_html {
        axum::response::Html(GraphiQLSource::build().endpoint("/graphql").finish()).into_response()
    } else {
        (
            axum::http::StatusCode::METHOD_NOT_ALLOWED,
            axum::Json(serde_json::json!({
                "error": "GET requests are not supported for GraphQL queries. Use POST with Content-Type: application/json"
            })),
        )
            .into_response()
    }
}
