//! Prometheus Metrics Definitions
//!
//! Request counters and latency histograms are updated by the performance
//! middleware. Cache gauges mirror `CacheManager::get_cache_stats` and are
//! refreshed on every scrape of `/metrics`.
//!
//! Each [`MotorwayMetrics`] owns its own [`Registry`], so several app states
//! can coexist in one process.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use motorway_cache::CacheStatsReport;
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::constants::HTTP_LATENCY_BUCKETS;
use crate::error::ApiResult;
use crate::state::AppState;

/// Container for all Motorway metrics.
#[derive(Clone)]
pub struct MotorwayMetrics {
    registry: Registry,

    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Approximate cache entries - labels: entity, shape
    pub cache_entries: IntGaugeVec,

    /// Cache lookups since the last clear - labels: result (hit/miss)
    pub cache_lookups: IntGaugeVec,
}

impl MotorwayMetrics {
    /// Create all metrics and register them with a fresh registry.
    pub fn new() -> ApiResult<Self> {
        let registry = Registry::new();

        let http_requests_total = CounterVec::new(
            Opts::new("motorway_http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "motorway_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(HTTP_LATENCY_BUCKETS.to_vec()),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        let cache_entries = IntGaugeVec::new(
            Opts::new(
                "motorway_cache_entries",
                "Approximate number of cached entries per entity and shape",
            ),
            &["entity", "shape"],
        )?;
        registry.register(Box::new(cache_entries.clone()))?;

        let cache_lookups = IntGaugeVec::new(
            Opts::new(
                "motorway_cache_lookups",
                "Cache lookups since the caches were last cleared",
            ),
            &["result"],
        )?;
        registry.register(Box::new(cache_lookups.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            cache_entries,
            cache_lookups,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(
        &self,
        method: &str,
        path: &str,
        status: u16,
        duration_secs: f64,
    ) -> Result<(), prometheus::Error> {
        let status_str = status.to_string();
        self.http_requests_total
            .get_metric_with_label_values(&[method, path, status_str.as_str()])?
            .inc();
        self.http_request_duration_seconds
            .get_metric_with_label_values(&[method, path])?
            .observe(duration_secs);
        Ok(())
    }

    /// Copy a cache stats report into the cache gauges.
    pub fn observe_cache_stats(&self, stats: &CacheStatsReport) {
        for (entity, counts) in &stats.entities {
            for (shape, value) in [
                ("bulk", counts.bulk),
                ("individual", counts.individual),
                ("grouped", counts.grouped),
            ] {
                self.cache_entries
                    .with_label_values(&[*entity, shape])
                    .set(clamp_i64(value));
            }
        }
        self.cache_lookups
            .with_label_values(&["hit"])
            .set(clamp_i64(stats.performance.hits));
        self.cache_lookups
            .with_label_values(&["miss"])
            .set(clamp_i64(stats.performance.misses));
    }

    /// Encode every registered metric in the Prometheus text format.
    pub fn encode(&self) -> ApiResult<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state
        .metrics
        .observe_cache_stats(&state.cache.get_cache_stats());

    match state.metrics.encode() {
        Ok(buffer) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
