//! Cache manager: owns every entity cache and the shared counters.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use motorway_core::{Auction, CacheConfig, Car, CatalogEntity, EntityId, EntityKind, Service};
use serde::Serialize;

use crate::counters::{CacheCounters, CounterSnapshot, KindCounts};
use crate::entity::{EntityCaches, InvalidationReport};
use crate::retry::RetryExecutor;
use crate::store::EntityStore;

/// Storage collaborators for every cached entity family.
#[derive(Clone)]
pub struct CatalogStores {
    pub services: Arc<dyn EntityStore<Service>>,
    pub cars: Arc<dyn EntityStore<Car>>,
    pub auctions: Arc<dyn EntityStore<Auction>>,
}

/// Hit/miss summary in the stats report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachePerformance {
    pub hits: u64,
    pub misses: u64,
    /// `"0%"` before any lookup, otherwise a percentage with two decimals.
    pub hit_rate: String,
}

/// Snapshot returned by [`CacheManager::get_cache_stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsReport {
    /// Approximate entry counts, keyed by plural entity name.
    pub entities: BTreeMap<&'static str, KindCounts>,
    pub total_entries: u64,
    pub performance: CachePerformance,
    pub timestamp: DateTime<Utc>,
}

impl CacheStatsReport {
    fn from_snapshot(snapshot: CounterSnapshot) -> Self {
        let entities: BTreeMap<_, _> = EntityKind::ALL
            .iter()
            .map(|kind| (kind.plural(), snapshot.kind(*kind)))
            .collect();
        let total_entries = entities.values().map(KindCounts::total).sum();

        Self {
            entities,
            total_entries,
            performance: CachePerformance {
                hits: snapshot.hits,
                misses: snapshot.misses,
                hit_rate: format_hit_rate(snapshot.hit_rate()),
            },
            timestamp: Utc::now(),
        }
    }
}

fn format_hit_rate(rate: Option<f64>) -> String {
    match rate {
        Some(rate) => format!("{:.2}%", rate),
        None => "0%".to_string(),
    }
}

/// Owns the memoized reads for services, cars and auctions.
///
/// Services use the long tier, cars the medium tier and auctions the short
/// tier. Write paths call the matching `invalidate_*` method after a
/// successful write.
pub struct CacheManager {
    services: EntityCaches<Service>,
    cars: EntityCaches<Car>,
    auctions: EntityCaches<Auction>,
    counters: Arc<CacheCounters>,
    retry: Arc<RetryExecutor>,
    config: CacheConfig,
}

impl CacheManager {
    pub fn new(config: CacheConfig, stores: CatalogStores) -> Self {
        let counters = Arc::new(CacheCounters::new());
        let retry = Arc::new(RetryExecutor::new(config.retry.clone()));

        let services = EntityCaches::new(
            stores.services,
            config.tiers.long,
            &config,
            Arc::clone(&retry),
            Arc::clone(&counters),
        );
        let cars = EntityCaches::new(
            stores.cars,
            config.tiers.medium,
            &config,
            Arc::clone(&retry),
            Arc::clone(&counters),
        );
        let auctions = EntityCaches::new(
            stores.auctions,
            config.tiers.short,
            &config,
            Arc::clone(&retry),
            Arc::clone(&counters),
        );

        Self {
            services,
            cars,
            auctions,
            counters,
            retry,
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The executor shared by every read; write paths may reuse it.
    pub fn retry_executor(&self) -> &RetryExecutor {
        &self.retry
    }

    pub fn services(&self) -> &EntityCaches<Service> {
        &self.services
    }

    pub fn cars(&self) -> &EntityCaches<Car> {
        &self.cars
    }

    pub fn auctions(&self) -> &EntityCaches<Auction> {
        &self.auctions
    }

    /// Caches for `T`, for code generic over the entity family.
    pub fn caches<T: CachedEntity>(&self) -> &EntityCaches<T> {
        T::caches(self)
    }

    pub fn invalidate_service_caches(
        &self,
        id: Option<EntityId>,
        previous_category: Option<&str>,
        next_category: Option<&str>,
    ) -> InvalidationReport {
        self.services
            .invalidate(id, previous_category, next_category)
    }

    pub fn invalidate_car_caches(
        &self,
        id: Option<EntityId>,
        previous_category: Option<&str>,
        next_category: Option<&str>,
    ) -> InvalidationReport {
        self.cars.invalidate(id, previous_category, next_category)
    }

    pub fn invalidate_auction_caches(
        &self,
        id: Option<EntityId>,
        previous_status: Option<&str>,
        next_status: Option<&str>,
    ) -> InvalidationReport {
        self.auctions.invalidate(id, previous_status, next_status)
    }

    /// Invalidate after a write to a `T`.
    pub fn invalidate<T: CachedEntity>(
        &self,
        id: Option<EntityId>,
        previous_group: Option<&str>,
        next_group: Option<&str>,
    ) -> InvalidationReport {
        self.caches::<T>()
            .invalidate(id, previous_group, next_group)
    }

    pub fn get_cache_stats(&self) -> CacheStatsReport {
        CacheStatsReport::from_snapshot(self.counters.snapshot())
    }

    /// Empty every cache and zero every counter.
    ///
    /// Every read's lock is held while the counters reset, so no load can
    /// store or count an entry part way through.
    pub fn clear_all_caches(&self) {
        let removed = {
            let mut services = self.services.lock_all();
            let mut cars = self.cars.lock_all();
            let mut auctions = self.auctions.lock_all();
            let removed = services.clear_uncounted()
                + cars.clear_uncounted()
                + auctions.clear_uncounted();
            self.counters.reset();
            removed
        };
        tracing::info!(removed, "[CACHE_INVALIDATION] All caches cleared");
    }

    /// Drop expired entries everywhere. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.services.purge_expired() + self.cars.purge_expired() + self.auctions.purge_expired()
    }
}

/// An entity family the [`CacheManager`] keeps caches for.
pub trait CachedEntity: CatalogEntity {
    fn caches(manager: &CacheManager) -> &EntityCaches<Self>;
}

impl CachedEntity for Service {
    fn caches(manager: &CacheManager) -> &EntityCaches<Self> {
        manager.services()
    }
}

impl CachedEntity for Car {
    fn caches(manager: &CacheManager) -> &EntityCaches<Self> {
        manager.cars()
    }
}

impl CachedEntity for Auction {
    fn caches(manager: &CacheManager) -> &EntityCaches<Self> {
        manager.auctions()
    }
}
