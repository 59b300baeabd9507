//! The three memoized reads kept for one entity family.

use std::sync::Arc;

use futures_util::FutureExt;
use motorway_core::{CacheConfig, CacheTier, CachedResult, CatalogEntity, EntityId};
use serde::Serialize;

use crate::counters::{CacheCounters, CacheShape, CounterSlot};
use crate::memo::{MemoGuard, MemoSettings, MemoizedRead};
use crate::retry::RetryExecutor;
use crate::store::EntityStore;

/// What a targeted invalidation removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationReport {
    pub bulk_entries: usize,
    pub individual_entries: usize,
    pub grouped_entries: usize,
}

impl InvalidationReport {
    pub fn total(&self) -> usize {
        self.bulk_entries + self.individual_entries + self.grouped_entries
    }
}

/// All three reads of one family held at once.
pub(crate) struct EntityCachesGuard<'a, T: CatalogEntity> {
    all: MemoGuard<'a, (), Vec<T>>,
    by_id: MemoGuard<'a, EntityId, Option<T>>,
    by_group: MemoGuard<'a, String, Vec<T>>,
}

impl<T: CatalogEntity> EntityCachesGuard<'_, T> {
    pub(crate) fn clear_uncounted(&mut self) -> usize {
        self.all.clear_uncounted() + self.by_id.clear_uncounted() + self.by_group.clear_uncounted()
    }
}

/// Bulk, by-id and by-group reads for one entity family.
pub struct EntityCaches<T: CatalogEntity> {
    all: MemoizedRead<(), Vec<T>>,
    by_id: MemoizedRead<EntityId, Option<T>>,
    by_group: MemoizedRead<String, Vec<T>>,
}

impl<T: CatalogEntity> EntityCaches<T> {
    pub fn new(
        store: Arc<dyn EntityStore<T>>,
        tier: CacheTier,
        config: &CacheConfig,
        retry: Arc<RetryExecutor>,
        counters: Arc<CacheCounters>,
    ) -> Self {
        let kind = T::kind();
        let settings = |shape: CacheShape, capacity: usize| {
            MemoSettings::new(tier, CounterSlot::new(kind, shape))
                .with_capacity(capacity)
                .with_background_refresh(config.background_refresh)
                .with_retry(Arc::clone(&retry))
                .with_counters(Arc::clone(&counters))
        };

        let all = {
            let store = Arc::clone(&store);
            MemoizedRead::new(
                format!("{}.all", kind.plural()),
                settings(CacheShape::Bulk, 1),
                Arc::new(move |_: ()| {
                    let store = Arc::clone(&store);
                    async move { store.list().await }.boxed()
                }),
            )
        };

        let by_id = {
            let store = Arc::clone(&store);
            MemoizedRead::new(
                format!("{}.by_id", kind.plural()),
                settings(CacheShape::Individual, config.max_keyed_entries),
                Arc::new(move |id: EntityId| {
                    let store = Arc::clone(&store);
                    async move { store.get(id).await }.boxed()
                }),
            )
        };

        let by_group = MemoizedRead::new(
            format!("{}.by_{}", kind.plural(), kind.group_attribute()),
            settings(CacheShape::Grouped, config.max_keyed_entries),
            Arc::new(move |group: String| {
                let store = Arc::clone(&store);
                async move { store.list_by_group(&group).await }.boxed()
            }),
        );

        Self {
            all,
            by_id,
            by_group,
        }
    }

    /// Every entity of this family.
    pub async fn all(&self) -> CachedResult<Vec<T>> {
        self.all.get(()).await
    }

    /// One entity by id. A missing id is a successful `None` and is cached
    /// like any other result.
    pub async fn get(&self, id: EntityId) -> CachedResult<Option<T>> {
        self.by_id.get(id).await
    }

    /// Entities whose grouping attribute equals `group`.
    pub async fn by_group(&self, group: &str) -> CachedResult<Vec<T>> {
        self.by_group.get(group.to_string()).await
    }

    /// Remove what a write to entity `id` may have made stale.
    ///
    /// The bulk read is always dropped. The by-id entry is dropped when `id`
    /// is given. Grouped entries are dropped for the previous and next group
    /// values; when neither is known every grouped entry goes.
    pub fn invalidate(
        &self,
        id: Option<EntityId>,
        previous_group: Option<&str>,
        next_group: Option<&str>,
    ) -> InvalidationReport {
        let bulk_entries = self.all.clear();
        let individual_entries = id.map_or(0, |id| usize::from(self.by_id.invalidate(&id)));

        let grouped_entries = match (previous_group, next_group) {
            (None, None) => self.by_group.clear(),
            (previous, next) => {
                let mut removed = 0;
                if let Some(group) = previous {
                    removed += usize::from(self.by_group.invalidate(&group.to_string()));
                }
                if let Some(group) = next.filter(|next| Some(*next) != previous) {
                    removed += usize::from(self.by_group.invalidate(&group.to_string()));
                }
                removed
            }
        };

        let report = InvalidationReport {
            bulk_entries,
            individual_entries,
            grouped_entries,
        };

        tracing::info!(
            entity = %T::kind(),
            id = ?id,
            previous_group,
            next_group,
            removed = report.total(),
            "[CACHE_INVALIDATION] {} caches invalidated",
            T::kind()
        );

        report
    }

    /// Lock all three reads, bulk first, then by id, then by group.
    pub(crate) fn lock_all(&self) -> EntityCachesGuard<'_, T> {
        EntityCachesGuard {
            all: self.all.lock(),
            by_id: self.by_id.lock(),
            by_group: self.by_group.lock(),
        }
    }

    /// Drop entries past their tier's max age.
    pub fn purge_expired(&self) -> usize {
        self.all.purge_expired() + self.by_id.purge_expired() + self.by_group.purge_expired()
    }

    /// Number of resident entries across the three reads.
    pub fn resident(&self) -> usize {
        self.all.len() + self.by_id.len() + self.by_group.len()
    }

    pub fn tier(&self) -> CacheTier {
        self.all.tier()
    }
}
