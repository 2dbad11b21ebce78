mod config;
mod contacts;
mod crm;
mod db;
mod errors;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::contacts::store::PgContactStore;
use crate::crm::PipedriveClient;
use crate::db::{create_pool, init_schema};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.rust_log.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CRM Relay API v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "CRM configured: {} (mock mode: {})",
        config.crm_configured(),
        !config.crm_configured()
    );

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    init_schema(&db).await?;

    // Initialize the local store and the Pipedrive client
    let store = Arc::new(PgContactStore::new(db));
    let crm = Arc::new(PipedriveClient::new(
        config.pipedrive_base_url.clone(),
        config.pipedrive_api_token.clone(),
    ));
    info!("Pipedrive client initialized");

    // Build app state
    let state = AppState {
        store,
        crm,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
