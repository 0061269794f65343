//! Marketplace Gateway Sync - Main Application Entry Point
//!
//! REST API server that manages marketplace API listings and keeps the API gateway's routes
//! and keys in line with them.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Gateway**: reqwest client with timeout and exponential-backoff retry
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build gateway client, health probe and services
//! 5. Spawn the reconciliation loop
//! 6. Start server on configured port

use std::sync::Arc;

use marketplace_gateway_sync::{
    AppState, SyncOptions, build_router,
    config::Config,
    db,
    gateway::{HealthProbe, HttpControlPlane, TokioSleeper},
    repositories::Repositories,
    services::run_reconciler,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        gateway_url = %config.gateway_url,
        public_gateway_url = %config.public_gateway_url(),
        "Configuration loaded"
    );

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    // Gateway admin client and liveness probe
    let control_plane = HttpControlPlane::new(
        &config.gateway_url,
        config.gateway_timeout(),
        config.retry_policy(),
        Arc::new(TokioSleeper),
    )?;
    let health = HealthProbe::new(&config.gateway_url, config.health_timeout())?;

    let state = AppState::new(
        Repositories::postgres(pool),
        Arc::new(control_plane),
        Arc::new(health),
        SyncOptions::from(&config),
    );

    // Repair gateway drift in the background
    tokio::spawn(run_reconciler(
        state.reconciler.clone(),
        config.reconcile_interval(),
    ));

    let app = build_router(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start serving HTTP requests
    axum::serve(listener, app).await?;

    Ok(())
}
