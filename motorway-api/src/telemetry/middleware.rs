//! Axum Middleware for Request Performance Monitoring
//!
//! Wraps every request with:
//! - a tracing span carrying method and path
//! - a timing measurement recorded into the [`PerformanceMonitor`]
//! - Prometheus request counter and latency histogram updates
//!
//! Monitoring failures are logged and otherwise ignored; the response is
//! always returned unchanged.
//!
//! [`PerformanceMonitor`]: crate::monitor::PerformanceMonitor

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tokio::time::Instant;
use tracing::{info_span, Instrument};

use crate::monitor::normalize_path;
use crate::state::AppState;

/// Performance middleware, installed with `from_fn_with_state`.
pub async fn performance_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
    );
    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status().as_u16();

    if let Err(e) = state.monitor.record(method.as_str(), &path, status, duration) {
        tracing::warn!(error = %e, method = %method, path = %path, "Failed to record request");
    }

    let route = normalize_path(&path);
    if let Err(e) =
        state
            .metrics
            .record_http_request(method.as_str(), &route, status, duration.as_secs_f64())
    {
        tracing::warn!(error = %e, route = %route, "Failed to record request metrics");
    }

    tracing::debug!(
        method = %method,
        path = %path,
        status,
        duration_ms = duration.as_millis() as u64,
        "Request completed"
    );

    response
}
