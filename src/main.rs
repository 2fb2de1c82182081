//! Workgraph server
//!
//! All operations are exposed via GraphQL at /graphql.

use std::time::Duration;

use anyhow::Context;
use workgraph::api::{self, AppState};
use workgraph::config::Config;
use workgraph::db::{Database, sync_schema};
use workgraph::graphql;
use workgraph::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    logging::init_tracing(config.log_format);
    tracing::info!("Starting workgraph");

    let db = Database::connect_with_retry(
        &config.database_url,
        config.database_max_connections,
        Duration::from_secs(5),
    )
    .await?;
    tracing::info!("Database connected");

    let sync = sync_schema(db.pool(), &config.type_table).await;
    if !sync.errors.is_empty() {
        for error in &sync.errors {
            tracing::error!(error = %error, "Schema sync error");
        }
        anyhow::bail!("schema sync failed with {} error(s)", sync.errors.len());
    }

    let client = db.client(config.client_config());
    let schema = graphql::build_schema(client);
    tracing::info!("GraphQL schema built");

    let app = api::router(AppState { db, schema });

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);
    tracing::info!("GraphQL playground: http://localhost:{}/graphql", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
