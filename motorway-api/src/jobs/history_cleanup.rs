//! History Cleanup Background Task
//!
//! Periodically drops request-history entries past their TTL and purges
//! expired cache entries. Without it, expired history is only pruned when
//! the metrics report is read, and idle cache entries linger until their key
//! is evicted or read again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use motorway_cache::CacheManager;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::monitor::PerformanceMonitor;

/// Shortest accepted interval; `tokio::time::interval` rejects zero.
const MIN_CLEANUP_INTERVAL: Duration = Duration::from_millis(1);

// ============================================================================
// METRICS
// ============================================================================

/// Counters for cleanup activity since startup.
#[derive(Debug, Default)]
pub struct HistoryCleanupMetrics {
    /// Request metrics dropped from history
    pub history_entries_pruned: AtomicU64,

    /// Expired cache entries removed
    pub cache_entries_purged: AtomicU64,

    /// Total cleanup cycles completed
    pub cleanup_cycles: AtomicU64,

    /// Cycles in which the history could not be pruned
    pub cleanup_errors: AtomicU64,
}

impl HistoryCleanupMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> HistoryCleanupSnapshot {
        HistoryCleanupSnapshot {
            history_entries_pruned: self.history_entries_pruned.load(Ordering::Relaxed),
            cache_entries_purged: self.cache_entries_purged.load(Ordering::Relaxed),
            cleanup_cycles: self.cleanup_cycles.load(Ordering::Relaxed),
            cleanup_errors: self.cleanup_errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of cleanup metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryCleanupSnapshot {
    pub history_entries_pruned: u64,
    pub cache_entries_purged: u64,
    pub cleanup_cycles: u64,
    pub cleanup_errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Run cleanup cycles every `every` until `shutdown_rx` turns true or its
/// sender is dropped.
pub async fn history_cleanup_task(
    monitor: Arc<PerformanceMonitor>,
    cache: Arc<CacheManager>,
    every: Duration,
    metrics: Arc<HistoryCleanupMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut cleanup_interval = interval(every.max(MIN_CLEANUP_INTERVAL));
    cleanup_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = every.as_secs(),
        "History cleanup task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("History cleanup task shutting down");
                    break;
                }
            }

            _ = cleanup_interval.tick() => {
                run_cleanup_cycle(&monitor, &cache, &metrics);
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        history_entries_pruned = snapshot.history_entries_pruned,
        cache_entries_purged = snapshot.cache_entries_purged,
        cleanup_cycles = snapshot.cleanup_cycles,
        cleanup_errors = snapshot.cleanup_errors,
        "History cleanup task completed"
    );
}

/// Perform one cleanup cycle.
fn run_cleanup_cycle(
    monitor: &PerformanceMonitor,
    cache: &CacheManager,
    metrics: &HistoryCleanupMetrics,
) {
    metrics.cleanup_cycles.fetch_add(1, Ordering::Relaxed);

    let pruned = match monitor.prune_history() {
        Ok(pruned) => pruned,
        Err(e) => {
            tracing::error!(error = %e, "Failed to prune request history");
            metrics.cleanup_errors.fetch_add(1, Ordering::Relaxed);
            0
        }
    };
    let purged = cache.purge_expired();

    metrics
        .history_entries_pruned
        .fetch_add(pruned as u64, Ordering::Relaxed);
    metrics
        .cache_entries_purged
        .fetch_add(purged as u64, Ordering::Relaxed);

    if pruned > 0 || purged > 0 {
        tracing::info!(
            history_entries = pruned,
            cache_entries = purged,
            "History cleanup cycle completed"
        );
    } else {
        tracing::trace!("History cleanup cycle completed with nothing to remove");
    }
}
