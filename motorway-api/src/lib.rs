//! Motorway API - HTTP layer over the read caches
//!
//! An Axum server exposing the cached catalogue (services, cars, auctions),
//! administrative cache and performance endpoints, and Prometheus metrics.
//! Every request is timed by the performance middleware; write handlers
//! invalidate exactly the caches their write touched.

pub mod config;
pub mod constants;
pub mod error;
pub mod extractors;
pub mod jobs;
pub mod macros;
pub mod monitor;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, CachedResultExt, ErrorCode};
pub use jobs::BackgroundJobs;
pub use monitor::{
    normalize_path, EndpointKey, EndpointStats, MonitorError, PerformanceMonitor,
    PerformanceReport, RequestMetric,
};
pub use routes::create_api_router;
pub use state::AppState;
