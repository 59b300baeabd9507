//! Motorway Cache - retrying, memoizing reads over the catalogue stores
//!
//! Layers, bottom-up:
//!
//! - [`RetryExecutor`] retries transient storage failures with capped
//!   exponential backoff and fails fast on constraint violations.
//! - [`MemoizedRead`] keeps successful results for a freshness tier, shares
//!   one in-flight load between concurrent callers and bounds its key count.
//! - [`EntityCaches`] groups the bulk, by-id and by-group reads of one entity
//!   family and knows which of them a write makes stale.
//! - [`CacheManager`] owns the caches for every family plus the hit/miss and
//!   entry counters behind [`CacheManager::get_cache_stats`].
//!
//! Storage is reached only through the [`EntityStore`] trait.

pub mod counters;
pub mod entity;
pub mod manager;
pub mod memo;
pub mod retry;
pub mod store;

pub use counters::{CacheCounters, CacheShape, CounterSlot, CounterSnapshot, KindCounts};
pub use entity::{EntityCaches, InvalidationReport};
pub use manager::{CachePerformance, CacheManager, CacheStatsReport, CachedEntity, CatalogStores};
pub use memo::{CacheKey, Loader, MemoSettings, MemoizedRead};
pub use retry::RetryExecutor;
pub use store::{EntityStore, MemoryStore};
