//! Motorway Test Utilities
//!
//! Shared test infrastructure for the Motorway workspace:
//! - [`ScriptedStore`]: an in-memory store with injectable failures, an
//!   optional artificial delay, and per-operation call counters
//! - Test fixtures for catalogue entities and a ready-made catalogue
//! - Proptest generators for entities and request paths

// Re-export core types for convenience
pub use motorway_cache::{CatalogStores, EntityStore, MemoryStore};
pub use motorway_core::{
    new_entity_id, Auction, AuctionStatus, Car, CatalogEntity, EntityId, Service, StorageError,
    StorageResult,
};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

// ============================================================================
// SCRIPTED STORE
// ============================================================================

/// Store operations, for counting and targeting failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    List,
    Get,
    ListByGroup,
    Save,
    Delete,
}

impl StoreOp {
    const ALL: [StoreOp; 5] = [
        StoreOp::List,
        StoreOp::Get,
        StoreOp::ListByGroup,
        StoreOp::Save,
        StoreOp::Delete,
    ];

    fn index(self) -> usize {
        match self {
            StoreOp::List => 0,
            StoreOp::Get => 1,
            StoreOp::ListByGroup => 2,
            StoreOp::Save => 3,
            StoreOp::Delete => 4,
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    /// Failures returned by the next calls, in order.
    queued: VecDeque<StorageError>,
    /// Returned by every call once `queued` is empty.
    always: Option<StorageError>,
    delay: Option<Duration>,
}

/// [`MemoryStore`] wrapper that can be told to fail.
///
/// Scripted failures apply to every operation, in call order. Counters
/// include failed calls.
pub struct ScriptedStore<T: CatalogEntity> {
    inner: MemoryStore<T>,
    script: Mutex<Script>,
    calls: [AtomicUsize; 5],
}

impl<T: CatalogEntity> Default for ScriptedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CatalogEntity> ScriptedStore<T> {
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    pub fn with_rows(rows: impl IntoIterator<Item = T>) -> Self {
        Self {
            inner: MemoryStore::with_rows(rows),
            script: Mutex::new(Script::default()),
            calls: Default::default(),
        }
    }

    /// Fail the next call with `error`. Queued failures stack.
    pub fn fail_next(&self, error: StorageError) -> &Self {
        self.script().queued.push_back(error);
        self
    }

    /// Fail the next `times` calls with clones of `error`.
    pub fn fail_times(&self, times: usize, error: StorageError) -> &Self {
        let mut script = self.script();
        for _ in 0..times {
            script.queued.push_back(error.clone());
        }
        drop(script);
        self
    }

    /// Fail every call (after any queued failures) until [`Self::heal`].
    pub fn fail_always(&self, error: StorageError) -> &Self {
        self.script().always = Some(error);
        self
    }

    /// Clear every scripted failure.
    pub fn heal(&self) -> &Self {
        let mut script = self.script();
        script.queued.clear();
        script.always = None;
        drop(script);
        self
    }

    /// Sleep for `delay` (on the tokio clock) before every call.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.script().delay = Some(delay);
        self
    }

    pub fn calls(&self, op: StoreOp) -> usize {
        self.calls[op.index()].load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        StoreOp::ALL.iter().map(|op| self.calls(*op)).sum()
    }

    /// Direct access to the backing rows, bypassing the script.
    pub fn inner(&self) -> &MemoryStore<T> {
        &self.inner
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        match self.script.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn enter(&self, op: StoreOp) -> StorageResult<()> {
        self.calls[op.index()].fetch_add(1, Ordering::SeqCst);
        let (delay, failure) = {
            let mut script = self.script();
            let failure = script
                .queued
                .pop_front()
                .or_else(|| script.always.clone());
            (script.delay, failure)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<T: CatalogEntity> EntityStore<T> for ScriptedStore<T> {
    async fn list(&self) -> StorageResult<Vec<T>> {
        self.enter(StoreOp::List).await?;
        self.inner.list().await
    }

    async fn get(&self, id: EntityId) -> StorageResult<Option<T>> {
        self.enter(StoreOp::Get).await?;
        self.inner.get(id).await
    }

    async fn list_by_group(&self, group: &str) -> StorageResult<Vec<T>> {
        self.enter(StoreOp::ListByGroup).await?;
        self.inner.list_by_group(group).await
    }

    async fn save(&self, entity: T) -> StorageResult<Option<T>> {
        self.enter(StoreOp::Save).await?;
        self.inner.save(entity).await
    }

    async fn delete(&self, id: EntityId) -> StorageResult<Option<T>> {
        self.enter(StoreOp::Delete).await?;
        self.inner.delete(id).await
    }
}

/// Scripted stores for every family, kept alongside the trait objects the
/// cache manager consumes.
#[derive(Clone)]
pub struct TestCatalog {
    pub services: Arc<ScriptedStore<Service>>,
    pub cars: Arc<ScriptedStore<Car>>,
    pub auctions: Arc<ScriptedStore<Auction>>,
}

impl TestCatalog {
    pub fn new(
        services: impl IntoIterator<Item = Service>,
        cars: impl IntoIterator<Item = Car>,
        auctions: impl IntoIterator<Item = Auction>,
    ) -> Self {
        Self {
            services: Arc::new(ScriptedStore::with_rows(services)),
            cars: Arc::new(ScriptedStore::with_rows(cars)),
            auctions: Arc::new(ScriptedStore::with_rows(auctions)),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new())
    }

    pub fn stores(&self) -> CatalogStores {
        CatalogStores {
            services: self.services.clone(),
            cars: self.cars.clone(),
            auctions: self.auctions.clone(),
        }
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Motorway entities and request paths.

    use super::*;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a timestamp between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
        (1577836800i64..1893456000i64)
            .prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now))
    }

    /// A lowercase category slug.
    pub fn arb_category() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("servicing".to_string()),
            Just("detailing".to_string()),
            Just("suv".to_string()),
            Just("hatchback".to_string()),
            "[a-z]{3,12}",
        ]
    }

    pub fn arb_auction_status() -> impl Strategy<Value = AuctionStatus> {
        prop_oneof![
            Just(AuctionStatus::Scheduled),
            Just(AuctionStatus::Live),
            Just(AuctionStatus::Closed),
        ]
    }

    pub fn arb_service() -> impl Strategy<Value = Service> {
        (
            arb_uuid(),
            "[A-Z][a-z]{3,10}( [a-z]{3,8})?",
            arb_category(),
            1_000i64..500_000,
            15i32..480,
            any::<bool>(),
            arb_timestamp(),
        )
            .prop_map(
                |(id, name, category, price_cents, duration_minutes, active, updated_at)| Service {
                    id,
                    name,
                    category,
                    price_cents,
                    duration_minutes,
                    active,
                    updated_at,
                },
            )
    }

    pub fn arb_car() -> impl Strategy<Value = Car> {
        (
            arb_uuid(),
            "[A-Z][a-z]{2,9}",
            "[A-Z0-9][a-z0-9]{1,6}",
            1995i32..2026,
            arb_category(),
            100_000i64..20_000_000,
            0i64..300_000,
            arb_timestamp(),
        )
            .prop_map(
                |(id, make, model, year, category, price_cents, mileage_km, listed_at)| Car {
                    id,
                    make,
                    model,
                    year,
                    category,
                    price_cents,
                    mileage_km,
                    listed_at,
                },
            )
    }

    pub fn arb_auction() -> impl Strategy<Value = Auction> {
        (
            arb_uuid(),
            arb_uuid(),
            arb_auction_status(),
            100_000i64..20_000_000,
            proptest::option::of(100_000i64..25_000_000),
            arb_timestamp(),
        )
            .prop_map(
                |(id, car_id, status, reserve_cents, current_bid_cents, ends_at)| Auction {
                    id,
                    car_id,
                    status,
                    reserve_cents,
                    current_bid_cents,
                    ends_at,
                },
            )
    }

    /// A path segment that stays as it is after normalization: short, and
    /// containing at least one non-digit.
    pub fn arb_static_segment() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,18}"
    }

    /// A path segment normalization turns into `:id`.
    pub fn arb_id_segment() -> impl Strategy<Value = String> {
        prop_oneof![
            arb_uuid().prop_map(|id| id.to_string()),
            arb_uuid().prop_map(|id| id.to_string().to_uppercase()),
            "[0-9]{1,24}",
        ]
    }

    /// A path segment normalization turns into `:token`.
    pub fn arb_token_segment() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9]{19,40}"
    }

    /// Response status codes seen in practice.
    pub fn arb_status_code() -> impl Strategy<Value = u16> {
        prop_oneof![
            Just(200u16),
            Just(201),
            Just(204),
            Just(400),
            Just(404),
            Just(409),
            Just(500),
            Just(503),
        ]
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built entities for common scenarios.

    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};

    pub fn service(category: &str) -> Service {
        Service {
            id: new_entity_id(),
            name: format!("{} package", category),
            category: category.to_string(),
            price_cents: 14_900,
            duration_minutes: 90,
            active: true,
            updated_at: Utc::now(),
        }
    }

    pub fn car(category: &str) -> Car {
        Car {
            id: new_entity_id(),
            make: "Toyota".to_string(),
            model: "Corolla".to_string(),
            year: 2020,
            category: category.to_string(),
            price_cents: 1_650_000,
            mileage_km: 38_500,
            listed_at: Utc::now(),
        }
    }

    pub fn auction(status: AuctionStatus) -> Auction {
        Auction {
            id: new_entity_id(),
            car_id: new_entity_id(),
            status,
            reserve_cents: 1_500_000,
            current_bid_cents: None,
            ends_at: Utc::now() + ChronoDuration::days(3),
        }
    }

    /// Two services, three cars and two auctions spread over several groups.
    pub fn sample_catalog() -> TestCatalog {
        TestCatalog::new(
            [service("servicing"), service("detailing")],
            [car("suv"), car("suv"), car("hatchback")],
            [
                auction(AuctionStatus::Live),
                auction(AuctionStatus::Scheduled),
            ],
        )
    }
}
