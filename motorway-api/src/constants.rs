//! Constants for the Motorway API
//!
//! Centralizing constants makes them easy to find, modify, and test.

// ============================================================================
// SERVER
// ============================================================================

/// Interface the server binds to when `MOTORWAY_API_BIND` is unset
pub const DEFAULT_API_BIND_HOST: &str = "0.0.0.0";

/// Port used when neither `PORT` nor `MOTORWAY_API_PORT` is set
pub const DEFAULT_API_PORT: u16 = 3000;

// ============================================================================
// CORS
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// TELEMETRY
// ============================================================================

/// Service name reported in logs
pub const DEFAULT_SERVICE_NAME: &str = "motorway-api";

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "motorway_api=info,motorway_cache=info,tower_http=info,warn";

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
pub const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

// ============================================================================
// PATH NORMALIZATION
// ============================================================================

/// Placeholder for UUID and numeric path segments
pub const ID_PLACEHOLDER: &str = ":id";

/// Placeholder for long opaque alphanumeric segments
pub const TOKEN_PLACEHOLDER: &str = ":token";

/// Minimum length of an alphanumeric segment treated as a token
pub const MIN_TOKEN_SEGMENT_LEN: usize = 20;

// ============================================================================
// ADMIN
// ============================================================================

/// Default number of entries returned by `GET /admin/performance/recent`
pub const DEFAULT_RECENT_REQUESTS_LIMIT: usize = 50;
