//! Request Performance Monitoring
//!
//! [`PerformanceMonitor`] keeps two views of the traffic it observes:
//!
//! - per-endpoint aggregate statistics keyed by method and normalized path,
//!   kept until [`PerformanceMonitor::reset`]
//! - a bounded history of recent requests, evicted least-recently-inserted
//!   first when full and dropped once older than the configured TTL
//!
//! Recording never fails the request it describes; see
//! [`crate::telemetry::performance_middleware`].

pub mod path;

pub use path::normalize_path;

use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use lru::LruCache;
use motorway_core::MonitorConfig;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

// ============================================================================
// ERRORS
// ============================================================================

/// Failure inside the monitor itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MonitorError {
    /// A thread panicked while holding the request history lock.
    #[error("request history lock poisoned")]
    HistoryPoisoned,
}

// ============================================================================
// TYPES
// ============================================================================

/// Endpoint identity: HTTP method plus normalized path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey {
    pub method: String,
    pub path: String,
}

impl EndpointKey {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Aggregate statistics for one endpoint. Durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStats {
    pub count: u64,
    pub total_duration: f64,
    pub avg_duration: f64,
    pub min_duration: f64,
    pub max_duration: f64,
    pub error_count: u64,
    /// Percentage of requests with status >= 400.
    pub error_rate: f64,
    pub last_accessed: DateTime<Utc>,
}

impl EndpointStats {
    fn first(duration_ms: f64, is_error: bool, at: DateTime<Utc>) -> Self {
        let mut stats = Self {
            count: 0,
            total_duration: 0.0,
            avg_duration: 0.0,
            min_duration: duration_ms,
            max_duration: duration_ms,
            error_count: 0,
            error_rate: 0.0,
            last_accessed: at,
        };
        stats.record(duration_ms, is_error, at);
        stats
    }

    fn record(&mut self, duration_ms: f64, is_error: bool, at: DateTime<Utc>) {
        self.count += 1;
        self.total_duration += duration_ms;
        self.min_duration = self.min_duration.min(duration_ms);
        self.max_duration = self.max_duration.max(duration_ms);
        if is_error {
            self.error_count += 1;
        }
        self.avg_duration = self.total_duration / self.count as f64;
        self.error_rate = self.error_count as f64 / self.count as f64 * 100.0;
        self.last_accessed = at;
    }
}

/// One observed request, as kept in the history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetric {
    pub method: String,
    /// Normalized path.
    pub path: String,
    pub duration: f64,
    pub status_code: u16,
    pub timestamp: DateTime<Utc>,
    pub is_error: bool,
}

#[derive(Debug)]
struct HistoryEntry {
    recorded_at: Instant,
    metric: RequestMetric,
}

/// Row of the slowest-endpoints table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSummary {
    pub endpoint: String,
    #[serde(flatten)]
    pub stats: EndpointStats,
}

/// Snapshot returned by [`PerformanceMonitor::get_metrics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    /// Slowest endpoints by average duration, slowest first.
    pub top_endpoints: Vec<EndpointSummary>,
    pub total_requests: u64,
    pub total_errors: u64,
    /// Percentage over every recorded request.
    pub error_rate: f64,
    /// Mean duration in milliseconds over every recorded request.
    pub average_response_time: f64,
    /// Every endpoint, keyed `"METHOD /normalized/path"`.
    pub endpoints: BTreeMap<String, EndpointStats>,
    pub slow_request_count: u64,
    pub slow_request_threshold_ms: u64,
    pub history_size: usize,
    pub monitoring_since: DateTime<Utc>,
}

// ============================================================================
// MONITOR
// ============================================================================

/// Collects per-endpoint statistics and a bounded recent-request history.
pub struct PerformanceMonitor {
    config: MonitorConfig,
    endpoints: DashMap<EndpointKey, EndpointStats>,
    history: Mutex<LruCache<u64, HistoryEntry>>,
    next_sequence: AtomicU64,
    slow_requests: AtomicU64,
    started_at: RwLock<DateTime<Utc>>,
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        let capacity = NonZeroUsize::new(config.history_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            endpoints: DashMap::new(),
            history: Mutex::new(LruCache::new(capacity)),
            next_sequence: AtomicU64::new(0),
            slow_requests: AtomicU64::new(0),
            started_at: RwLock::new(Utc::now()),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Record one completed request.
    ///
    /// Returns whether it was counted as slow. Endpoint statistics are
    /// updated even when the history cannot be written.
    pub fn record(
        &self,
        method: &str,
        raw_path: &str,
        status_code: u16,
        duration: Duration,
    ) -> Result<bool, MonitorError> {
        let path = normalize_path(raw_path);
        let duration_ms = duration.as_secs_f64() * 1000.0;
        let is_error = status_code >= 400;
        let now = Utc::now();

        let slow = duration >= self.config.slow_request_threshold;
        if slow {
            self.slow_requests.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                method,
                path = raw_path,
                endpoint = %path,
                status = status_code,
                duration_ms = duration.as_millis() as u64,
                threshold_ms = self.config.slow_request_threshold.as_millis() as u64,
                "[SLOW_REQUEST] {} {} took {}ms",
                method,
                raw_path,
                duration.as_millis()
            );
        }

        self.endpoints
            .entry(EndpointKey::new(method, path.clone()))
            .and_modify(|stats| stats.record(duration_ms, is_error, now))
            .or_insert_with(|| EndpointStats::first(duration_ms, is_error, now));

        let metric = RequestMetric {
            method: method.to_string(),
            path,
            duration: duration_ms,
            status_code,
            timestamp: now,
            is_error,
        };
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let mut history = self
            .history
            .lock()
            .map_err(|_| MonitorError::HistoryPoisoned)?;
        history.push(
            sequence,
            HistoryEntry {
                recorded_at: Instant::now(),
                metric,
            },
        );

        Ok(slow)
    }

    /// Drop history entries older than the configured TTL. Returns how many
    /// were removed.
    pub fn prune_history(&self) -> Result<usize, MonitorError> {
        let mut history = self
            .history
            .lock()
            .map_err(|_| MonitorError::HistoryPoisoned)?;
        Ok(prune_expired(&mut history, self.config.history_ttl))
    }

    /// Most recent requests still in history, newest first.
    pub fn recent_requests(&self, limit: usize) -> Result<Vec<RequestMetric>, MonitorError> {
        let mut history = self
            .history
            .lock()
            .map_err(|_| MonitorError::HistoryPoisoned)?;
        prune_expired(&mut history, self.config.history_ttl);
        Ok(history
            .iter()
            .take(limit)
            .map(|(_, entry)| entry.metric.clone())
            .collect())
    }

    /// Aggregate report over everything recorded since the last reset.
    pub fn get_metrics(&self) -> Result<PerformanceReport, MonitorError> {
        let history_size = {
            let mut history = self
                .history
                .lock()
                .map_err(|_| MonitorError::HistoryPoisoned)?;
            prune_expired(&mut history, self.config.history_ttl);
            history.len()
        };

        let mut rows: Vec<(EndpointKey, EndpointStats)> = self
            .endpoints
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let total_requests: u64 = rows.iter().map(|(_, stats)| stats.count).sum();
        let total_errors: u64 = rows.iter().map(|(_, stats)| stats.error_count).sum();
        let total_duration: f64 = rows.iter().map(|(_, stats)| stats.total_duration).sum();
        let (error_rate, average_response_time) = if total_requests == 0 {
            (0.0, 0.0)
        } else {
            (
                round2(total_errors as f64 / total_requests as f64 * 100.0),
                round2(total_duration / total_requests as f64),
            )
        };

        rows.sort_by(|(a_key, a), (b_key, b)| {
            b.avg_duration
                .total_cmp(&a.avg_duration)
                .then_with(|| a_key.cmp(b_key))
        });
        let top_endpoints = rows
            .iter()
            .take(self.config.top_endpoints)
            .map(|(key, stats)| EndpointSummary {
                endpoint: key.to_string(),
                stats: stats.clone(),
            })
            .collect();
        let endpoints = rows
            .into_iter()
            .map(|(key, stats)| (key.to_string(), stats))
            .collect();

        Ok(PerformanceReport {
            top_endpoints,
            total_requests,
            total_errors,
            error_rate,
            average_response_time,
            endpoints,
            slow_request_count: self.slow_requests.load(Ordering::Relaxed),
            slow_request_threshold_ms: self.config.slow_request_threshold.as_millis() as u64,
            history_size,
            monitoring_since: self.monitoring_since(),
        })
    }

    /// Statistics for one endpoint, if it has been seen.
    pub fn endpoint(&self, method: &str, normalized_path: &str) -> Option<EndpointStats> {
        self.endpoints
            .get(&EndpointKey::new(method, normalized_path))
            .map(|entry| entry.value().clone())
    }

    pub fn slow_request_count(&self) -> u64 {
        self.slow_requests.load(Ordering::Relaxed)
    }

    pub fn monitoring_since(&self) -> DateTime<Utc> {
        match self.started_at.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Forget every statistic and restart the monitoring window.
    ///
    /// A poisoned history lock is cleared here, so a reset also recovers the
    /// monitor after a panic.
    pub fn reset(&self) {
        self.endpoints.clear();
        {
            let mut history = match self.history.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            history.clear();
        }
        self.history.clear_poison();
        self.slow_requests.store(0, Ordering::Relaxed);

        let now = Utc::now();
        match self.started_at.write() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }

        tracing::info!("Performance metrics reset");
    }
}

/// Pop expired entries from the old end of the history.
///
/// Entries are never promoted after insertion, so LRU order is insertion
/// order and the scan can stop at the first live entry.
fn prune_expired(history: &mut LruCache<u64, HistoryEntry>, ttl: Duration) -> usize {
    let mut removed = 0;
    while let Some((_, oldest)) = history.peek_lru() {
        if oldest.recorded_at.elapsed() < ttl {
            break;
        }
        history.pop_lru();
        removed += 1;
    }
    removed
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
