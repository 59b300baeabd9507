//! Motorway Telemetry - Observability Infrastructure
//!
//! Structured logging setup, Prometheus metrics, and the request
//! performance middleware.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, MotorwayMetrics};
pub use middleware::performance_middleware;
pub use tracer::{init_tracing, TelemetryConfig};
