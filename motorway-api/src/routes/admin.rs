//! Administrative endpoints: cache statistics, request performance and the
//! aggregate dashboard.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use motorway_cache::{CacheManager, CacheStatsReport};
use motorway_core::{CachedResult, CatalogEntity};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_RECENT_REQUESTS_LIMIT;
use crate::error::ApiResult;
use crate::monitor::{PerformanceMonitor, PerformanceReport, RequestMetric};
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Response of `POST /admin/cache/clear`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheClearResponse {
    pub cleared: bool,
    pub stats: CacheStatsReport,
}

/// Response of `POST /admin/performance/reset`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceResetResponse {
    pub reset: bool,
    pub monitoring_since: DateTime<Utc>,
}

/// Query of `GET /admin/performance/recent`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RecentRequestsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Ok,
    Unavailable,
}

/// One entity family as seen by the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSource {
    pub status: SourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    /// Counts per grouping attribute value.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub attempts: u32,
}

impl DashboardSource {
    fn from_result<T: CatalogEntity>(result: CachedResult<Vec<T>>) -> Self {
        let attempts = result.attempts();
        match result.into_result() {
            Ok(entities) => {
                let mut groups = BTreeMap::new();
                for entity in &entities {
                    *groups.entry(entity.group().to_string()).or_insert(0) += 1;
                }
                Self {
                    status: SourceStatus::Ok,
                    total: Some(entities.len()),
                    groups,
                    error_code: None,
                    attempts,
                }
            }
            Err(error) => {
                tracing::warn!(
                    entity = %T::kind(),
                    code = error.code().unwrap_or("none"),
                    attempts,
                    "Dashboard source unavailable"
                );
                Self {
                    status: SourceStatus::Unavailable,
                    total: None,
                    groups: BTreeMap::new(),
                    error_code: Some(error.code().unwrap_or("UNKNOWN").to_string()),
                    attempts,
                }
            }
        }
    }

    fn is_available(&self) -> bool {
        self.status == SourceStatus::Ok
    }
}

/// Request traffic summary shown on the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSummary {
    pub total_requests: u64,
    pub error_rate: f64,
    pub average_response_time: f64,
    pub slow_request_count: u64,
}

impl From<&PerformanceReport> for TrafficSummary {
    fn from(report: &PerformanceReport) -> Self {
        Self {
            total_requests: report.total_requests,
            error_rate: report.error_rate,
            average_response_time: report.average_response_time,
            slow_request_count: report.slow_request_count,
        }
    }
}

/// Response of `GET /admin/dashboard`.
///
/// Always returned with 200; a failed source is reported as unavailable
/// and `degraded` is set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub degraded: bool,
    pub sources: BTreeMap<&'static str, DashboardSource>,
    pub cache: CacheStatsReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic: Option<TrafficSummary>,
    pub generated_at: DateTime<Utc>,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /admin/cache/stats
pub async fn cache_stats(State(cache): State<Arc<CacheManager>>) -> Json<CacheStatsReport> {
    Json(cache.get_cache_stats())
}

/// POST /admin/cache/clear
pub async fn clear_caches(State(cache): State<Arc<CacheManager>>) -> Json<CacheClearResponse> {
    cache.clear_all_caches();
    Json(CacheClearResponse {
        cleared: true,
        stats: cache.get_cache_stats(),
    })
}

/// GET /admin/performance
pub async fn performance(
    State(monitor): State<Arc<PerformanceMonitor>>,
) -> ApiResult<Json<PerformanceReport>> {
    Ok(Json(monitor.get_metrics()?))
}

/// GET /admin/performance/recent - newest first, `limit` defaults to 50
pub async fn recent_requests(
    State(monitor): State<Arc<PerformanceMonitor>>,
    Query(query): Query<RecentRequestsQuery>,
) -> ApiResult<Json<Vec<RequestMetric>>> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_REQUESTS_LIMIT);
    Ok(Json(monitor.recent_requests(limit)?))
}

/// POST /admin/performance/reset
pub async fn reset_performance(
    State(monitor): State<Arc<PerformanceMonitor>>,
) -> Json<PerformanceResetResponse> {
    monitor.reset();
    Json(PerformanceResetResponse {
        reset: true,
        monitoring_since: monitor.monitoring_since(),
    })
}

/// GET /admin/dashboard
pub async fn dashboard(State(state): State<AppState>) -> Json<DashboardResponse> {
    let (services, cars, auctions) = tokio::join!(
        state.cache.services().all(),
        state.cache.cars().all(),
        state.cache.auctions().all(),
    );

    let mut sources = BTreeMap::new();
    sources.insert("services", DashboardSource::from_result(services));
    sources.insert("cars", DashboardSource::from_result(cars));
    sources.insert("auctions", DashboardSource::from_result(auctions));

    let traffic = match state.monitor.get_metrics() {
        Ok(report) => Some(TrafficSummary::from(&report)),
        Err(e) => {
            tracing::warn!(error = %e, "Dashboard traffic summary unavailable");
            None
        }
    };

    Json(DashboardResponse {
        degraded: sources.values().any(|source| !source.is_available()),
        sources,
        cache: state.cache.get_cache_stats(),
        traffic,
        generated_at: Utc::now(),
    })
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/cache/stats", get(cache_stats))
        .route("/cache/clear", post(clear_caches))
        .route("/performance", get(performance))
        .route("/performance/recent", get(recent_requests))
        .route("/performance/reset", post(reset_performance))
        .route("/dashboard", get(dashboard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use motorway_core::{new_entity_id, Car, StorageError};

    fn car(category: &str) -> Car {
        Car {
            id: new_entity_id(),
            make: "Volvo".to_string(),
            model: "XC60".to_string(),
            year: 2021,
            category: category.to_string(),
            price_cents: 3_200_000,
            mileage_km: 41_000,
            listed_at: Utc::now(),
        }
    }

    #[test]
    fn test_source_counts_groups() {
        let source = DashboardSource::from_result(CachedResult::success(
            vec![car("suv"), car("suv"), car("estate")],
            1,
        ));
        assert!(source.is_available());
        assert_eq!(source.total, Some(3));
        assert_eq!(source.groups.get("suv"), Some(&2));
        assert_eq!(source.groups.get("estate"), Some(&1));
    }

    #[test]
    fn test_failed_source_is_unavailable() -> Result<(), serde_json::Error> {
        let source = DashboardSource::from_result::<Car>(CachedResult::failure(
            StorageError::connection_failed("refused"),
            3,
        ));
        assert!(!source.is_available());

        let json = serde_json::to_value(&source)?;
        assert_eq!(json["status"], "unavailable");
        assert_eq!(json["errorCode"], "08006");
        assert_eq!(json["attempts"], 3);
        assert!(json.get("total").is_none());
        Ok(())
    }
}
