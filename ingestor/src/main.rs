use anyhow::Context;
use axum::{http::StatusCode, routing::get, Router};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vital_ingestor::config::{Config, StoreKind};
use vital_ingestor::db::PgStore;
use vital_ingestor::store::{MemoryStore, SampleStore};
use vital_ingestor::{metrics, rest};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        error!("Fatal: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    info!("Starting device vital ingestor");
    info!("HTTP server: {}", config.http_addr);

    metrics::init_metrics().context("failed to register metrics")?;

    let store: Arc<dyn SampleStore> = match config.store {
        StoreKind::Postgres => {
            info!("Database: {}", config.redacted_database_url());
            Arc::new(
                PgStore::connect(&config.database_url, config.db_max_connections)
                    .await
                    .context("failed to connect to database")?,
            )
        }
        StoreKind::Memory => {
            info!("Using in-memory store, readings are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Build HTTP app with REST API and metrics endpoint
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(store));

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.http_addr))?;

    info!("HTTP server listening on {}", config.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    metrics::gather_metrics().map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}
