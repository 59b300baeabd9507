//! REST API Routes Module
//!
//! - Catalogue routes per cached entity family (`/api/services`,
//!   `/api/cars`, `/api/auctions`)
//! - Administrative stats and dashboard (`/admin/*`)
//! - Health checks (`/health/*`) and Prometheus metrics (`/metrics`)
//!
//! Every route runs behind the performance middleware.

pub mod admin;
pub mod catalog;
pub mod health;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use motorway_core::{Auction, Car, Service};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, performance_middleware};

// Re-export route creation functions for convenience
pub use admin::create_router as admin_router;
pub use catalog::{catalog_routes, CatalogResource};
pub use health::create_router as health_router;

fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        // Development mode: allow all origins
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

/// Create the complete API router.
pub fn create_api_router(state: AppState, api_config: &ApiConfig) -> Router {
    Router::new()
        .nest("/api/services", catalog_routes::<Service>())
        .nest("/api/cars", catalog_routes::<Car>())
        .nest("/api/auctions", catalog_routes::<Auction>())
        .nest("/admin", admin_router())
        .nest("/health", health_router())
        .route("/metrics", get(metrics_handler))
        .layer(from_fn_with_state(state.clone(), performance_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(api_config))
        .with_state(state)
}
