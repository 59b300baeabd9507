//! Motorway API Server Entry Point
//!
//! Bootstraps configuration and tracing, builds the in-memory catalogue
//! stores and starts the Axum HTTP server with its background jobs.

use std::sync::Arc;

use motorway_api::telemetry::{init_tracing, TelemetryConfig};
use motorway_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState, BackgroundJobs};
use motorway_cache::{CatalogStores, MemoryStore};
use motorway_core::{Auction, CacheConfig, Car, MonitorConfig, Service};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let cache_config = CacheConfig::from_env();
    cache_config.validate()?;
    let monitor_config = MonitorConfig::from_env();
    monitor_config.validate()?;
    let api_config = ApiConfig::from_env()?;
    api_config.validate()?;

    let stores = CatalogStores {
        services: Arc::new(MemoryStore::<Service>::new()),
        cars: Arc::new(MemoryStore::<Car>::new()),
        auctions: Arc::new(MemoryStore::<Auction>::new()),
    };

    let state = AppState::new(cache_config, monitor_config, stores)?;
    let jobs = BackgroundJobs::start(&state);
    let app = create_api_router(state, &api_config);

    let addr = api_config.resolve_bind_addr()?;
    tracing::info!(%addr, "Starting Motorway API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    let cleanup = jobs.shutdown().await;
    tracing::info!(
        cleanup_cycles = cleanup.cleanup_cycles,
        "Motorway API server stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
