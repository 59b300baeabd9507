//! Background Jobs for the Motorway API
//!
//! - `history_cleanup`: prunes expired request history and cache entries
//!
//! Jobs are owned by [`BackgroundJobs`], started next to the server and
//! stopped by its explicit [`BackgroundJobs::shutdown`] hook:
//!
//! ```ignore
//! let jobs = BackgroundJobs::start(&state);
//! axum::serve(listener, app).with_graceful_shutdown(signal).await?;
//! jobs.shutdown().await;
//! ```

pub mod history_cleanup;

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::state::AppState;

// Re-export commonly used types
pub use history_cleanup::{
    history_cleanup_task, HistoryCleanupMetrics, HistoryCleanupSnapshot,
};

/// Handle to the running background tasks.
pub struct BackgroundJobs {
    shutdown_tx: watch::Sender<bool>,
    history_cleanup: JoinHandle<()>,
    metrics: Arc<HistoryCleanupMetrics>,
}

impl BackgroundJobs {
    /// Spawn every background task on the current runtime.
    pub fn start(state: &AppState) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let metrics = Arc::new(HistoryCleanupMetrics::new());

        let history_cleanup = tokio::spawn(history_cleanup_task(
            Arc::clone(&state.monitor),
            Arc::clone(&state.cache),
            state.monitor.config().cleanup_interval,
            Arc::clone(&metrics),
            shutdown_rx,
        ));

        Self {
            shutdown_tx,
            history_cleanup,
            metrics,
        }
    }

    pub fn metrics(&self) -> HistoryCleanupSnapshot {
        self.metrics.snapshot()
    }

    /// Signal every task to stop and wait for them to finish.
    pub async fn shutdown(self) -> HistoryCleanupSnapshot {
        // Receivers only disappear once the task has already exited.
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = self.history_cleanup.await {
            tracing::error!(error = %e, "History cleanup task did not exit cleanly");
        }

        self.metrics.snapshot()
    }
}
