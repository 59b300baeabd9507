//! Shared application state for Axum routers.

use std::sync::Arc;

use motorway_cache::{CacheManager, CatalogStores};
use motorway_core::{CacheConfig, MonitorConfig};

use crate::error::ApiResult;
use crate::monitor::PerformanceMonitor;
use crate::telemetry::MotorwayMetrics;

/// Application-wide state shared across all routes.
///
/// This is the composition root: the one [`CacheManager`] and the one
/// [`PerformanceMonitor`] of the process live here.
#[derive(Clone)]
pub struct AppState {
    /// Memoized reads and invalidation for every catalogue family.
    pub cache: Arc<CacheManager>,
    /// Storage collaborators, used directly by write paths.
    pub stores: CatalogStores,
    pub monitor: Arc<PerformanceMonitor>,
    pub metrics: Arc<MotorwayMetrics>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        cache_config: CacheConfig,
        monitor_config: MonitorConfig,
        stores: CatalogStores,
    ) -> ApiResult<Self> {
        Ok(Self {
            cache: Arc::new(CacheManager::new(cache_config, stores.clone())),
            stores,
            monitor: Arc::new(PerformanceMonitor::new(monitor_config)),
            metrics: Arc::new(MotorwayMetrics::new()?),
            start_time: std::time::Instant::now(),
        })
    }
}

// Use macro to reduce boilerplate for FromRef implementations
crate::impl_from_ref!(Arc<CacheManager>, cache);
crate::impl_from_ref!(CatalogStores, stores);
crate::impl_from_ref!(Arc<PerformanceMonitor>, monitor);
crate::impl_from_ref!(std::time::Instant, start_time);
