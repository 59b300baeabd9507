//! Memoized storage reads.
//!
//! A [`MemoizedRead`] wraps one loader (one storage query shape) and keeps its
//! successful results for the tier's `max_age`. Concurrent misses for the same
//! key share a single in-flight load. Failed loads are never stored.
//!
//! Each in-flight load holds a ticket. Invalidation removes the ticket, so a
//! load that started before an invalidation can still answer its callers but
//! will not write its (possibly stale) value into the cache.

use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use motorway_core::{CacheTier, CachedResult, EntityId, StorageResult, DEFAULT_MAX_KEYED_ENTRIES};
use tokio::time::Instant;

use crate::counters::{CacheCounters, CounterSlot};
use crate::retry::RetryExecutor;

/// Async loader behind a memoized read.
pub type Loader<K, V> = Arc<dyn Fn(K) -> BoxFuture<'static, StorageResult<V>> + Send + Sync>;

type SharedLoad<V> = Shared<BoxFuture<'static, CachedResult<V>>>;

/// Key type of a memoized read.
pub trait CacheKey: Hash + Eq + Clone + Send + Sync + 'static {
    /// Suffix appended to the read's name in log lines.
    fn label(&self) -> Option<String>;
}

impl CacheKey for () {
    fn label(&self) -> Option<String> {
        None
    }
}

impl CacheKey for EntityId {
    fn label(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl CacheKey for String {
    fn label(&self) -> Option<String> {
        Some(self.clone())
    }
}

/// Construction parameters for a [`MemoizedRead`].
#[derive(Debug, Clone)]
pub struct MemoSettings {
    pub tier: CacheTier,
    /// Maximum number of distinct keys kept; least recently used go first.
    pub capacity: NonZeroUsize,
    /// Serve entries past `refresh_after` and reload them in the background.
    pub background_refresh: bool,
    pub retry: Arc<RetryExecutor>,
    pub counters: Arc<CacheCounters>,
    pub slot: CounterSlot,
}

impl MemoSettings {
    pub fn new(tier: CacheTier, slot: CounterSlot) -> Self {
        Self {
            tier,
            capacity: NonZeroUsize::new(DEFAULT_MAX_KEYED_ENTRIES).unwrap_or(NonZeroUsize::MIN),
            background_refresh: false,
            retry: Arc::new(RetryExecutor::default()),
            counters: Arc::new(CacheCounters::new()),
            slot,
        }
    }

    /// Set the key capacity. Zero is raised to one.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        self
    }

    pub fn with_background_refresh(mut self, enabled: bool) -> Self {
        self.background_refresh = enabled;
        self
    }

    pub fn with_retry(mut self, retry: Arc<RetryExecutor>) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_counters(mut self, counters: Arc<CacheCounters>) -> Self {
        self.counters = counters;
        self
    }
}

struct Entry<V> {
    value: V,
    fetched_at: Instant,
}

struct InFlight<V> {
    ticket: u64,
    load: SharedLoad<V>,
}

struct State<K: Hash + Eq, V> {
    entries: LruCache<K, Entry<V>>,
    in_flight: HashMap<K, InFlight<V>>,
    next_ticket: u64,
}

enum Lookup<V> {
    Fresh { value: V, stale: bool },
    Expired,
    Missing,
}

struct Inner<K: Hash + Eq, V> {
    name: String,
    settings: MemoSettings,
    loader: Loader<K, V>,
    state: Mutex<State<K, V>>,
}

/// Exclusive access to a [`MemoizedRead`]'s entries, see [`MemoizedRead::lock`].
pub(crate) struct MemoGuard<'a, K: Hash + Eq, V>(MutexGuard<'a, State<K, V>>);

impl<K: Hash + Eq, V> MemoGuard<'_, K, V> {
    /// Drop every entry and detach every load, leaving counters to the caller.
    pub(crate) fn clear_uncounted(&mut self) -> usize {
        let removed = self.0.entries.len();
        self.0.entries.clear();
        self.0.in_flight.clear();
        removed
    }
}

/// A retrying, memoizing, deduplicating read.
pub struct MemoizedRead<K: Hash + Eq, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K: Hash + Eq, V> Clone for MemoizedRead<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> MemoizedRead<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, settings: MemoSettings, loader: Loader<K, V>) -> Self {
        let state = State {
            entries: LruCache::new(settings.capacity),
            in_flight: HashMap::new(),
            next_ticket: 0,
        };
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                settings,
                loader,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn tier(&self) -> CacheTier {
        self.inner.settings.tier
    }

    /// Read through the cache.
    ///
    /// Hits return with `attempts == 0`. Misses either join the load already
    /// running for `key` or start one through the retry executor.
    pub async fn get(&self, key: K) -> CachedResult<V> {
        let load = {
            let mut guard = self.inner.lock_state();
            let state = &mut *guard;
            let tier = self.inner.settings.tier;

            let lookup = match state.entries.get(&key) {
                Some(entry) => {
                    let age = Instant::now().saturating_duration_since(entry.fetched_at);
                    if age < tier.max_age {
                        Lookup::Fresh {
                            value: entry.value.clone(),
                            stale: age > tier.refresh_after(),
                        }
                    } else {
                        Lookup::Expired
                    }
                }
                None => Lookup::Missing,
            };

            match lookup {
                Lookup::Fresh { value, stale } => {
                    self.inner.settings.counters.record_hit();
                    if stale
                        && self.inner.settings.background_refresh
                        && !state.in_flight.contains_key(&key)
                    {
                        Inner::spawn_refresh(&self.inner, state, key);
                    }
                    return CachedResult::cached(value);
                }
                Lookup::Expired => {
                    state.entries.pop(&key);
                    self.inner
                        .settings
                        .counters
                        .decrement(self.inner.settings.slot, 1);
                }
                Lookup::Missing => {}
            }

            self.inner.settings.counters.record_miss();
            match state.in_flight.get(&key) {
                Some(in_flight) => in_flight.load.clone(),
                None => Inner::register(&self.inner, state, key),
            }
        };

        load.await
    }

    /// Drop the entry for `key` and detach any load in progress for it.
    /// Returns whether an entry was removed.
    pub fn invalidate(&self, key: &K) -> bool {
        let mut state = self.inner.lock_state();
        state.in_flight.remove(key);
        let removed = state.entries.pop(key).is_some();
        if removed {
            self.inner
                .settings
                .counters
                .decrement(self.inner.settings.slot, 1);
        }
        removed
    }

    /// Drop every entry and detach every load in progress.
    /// Returns the number of entries removed.
    pub fn clear(&self) -> usize {
        let mut state = self.inner.lock_state();
        let removed = state.entries.len();
        state.entries.clear();
        state.in_flight.clear();
        self.inner
            .settings
            .counters
            .decrement(self.inner.settings.slot, removed as u64);
        removed
    }

    /// Remove entries older than the tier's `max_age`.
    pub fn purge_expired(&self) -> usize {
        let mut state = self.inner.lock_state();
        let now = Instant::now();
        let max_age = self.inner.settings.tier.max_age;

        let expired: Vec<K> = state
            .entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.fetched_at) >= max_age)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.entries.pop(key);
        }
        self.inner
            .settings
            .counters
            .decrement(self.inner.settings.slot, expired.len() as u64);
        expired.len()
    }

    /// Hold this read's state exclusively. Counter updates for this read
    /// only happen under the same lock.
    pub(crate) fn lock(&self) -> MemoGuard<'_, K, V> {
        MemoGuard(self.inner.lock_state())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock_state().entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Inner<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    fn lock_state(&self) -> MutexGuard<'_, State<K, V>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn label(&self, key: &K) -> String {
        match key.label() {
            Some(suffix) => format!("{}:{}", self.name, suffix),
            None => self.name.clone(),
        }
    }

    fn register(inner: &Arc<Self>, state: &mut State<K, V>, key: K) -> SharedLoad<V> {
        let ticket = state.next_ticket;
        state.next_ticket += 1;

        let load = Self::load(Arc::clone(inner), key.clone(), ticket).shared();
        state.in_flight.insert(
            key,
            InFlight {
                ticket,
                load: load.clone(),
            },
        );
        load
    }

    fn spawn_refresh(inner: &Arc<Self>, state: &mut State<K, V>, key: K) {
        // Outside a runtime the entry simply ages out.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        tracing::debug!(operation = %inner.label(&key), "Refreshing cache entry in background");
        let load = Self::register(inner, state, key);
        handle.spawn(async move {
            load.await;
        });
    }

    fn load(inner: Arc<Self>, key: K, ticket: u64) -> BoxFuture<'static, CachedResult<V>> {
        async move {
            let label = inner.label(&key);
            let loader = Arc::clone(&inner.loader);
            let result = inner
                .settings
                .retry
                .run(&label, || loader(key.clone()))
                .await;

            if let Some(error) = result.error() {
                tracing::error!(
                    operation = %label,
                    attempts = result.attempts(),
                    code = error.code().unwrap_or("none"),
                    error = %error,
                    "[CACHE_READ_FAILED] {} could not be loaded",
                    label
                );
            }

            inner.complete(key, ticket, &result);
            result
        }
        .boxed()
    }

    fn complete(&self, key: K, ticket: u64, result: &CachedResult<V>) {
        let mut guard = self.lock_state();
        let state = &mut *guard;

        let registered = state
            .in_flight
            .get(&key)
            .is_some_and(|in_flight| in_flight.ticket == ticket);
        if !registered {
            // Invalidated while loading.
            return;
        }
        state.in_flight.remove(&key);

        if let Some(value) = result.data() {
            let entry = Entry {
                value: value.clone(),
                fetched_at: Instant::now(),
            };
            // Replacing a key or evicting another one leaves the count unchanged.
            if state.entries.push(key, entry).is_none() {
                self.settings.counters.increment(self.settings.slot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::CacheShape;
    use motorway_core::{EntityKind, StorageError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    const SLOT: CounterSlot = CounterSlot {
        kind: EntityKind::Service,
        shape: CacheShape::Grouped,
    };

    fn tier(max_age_secs: u64) -> CacheTier {
        CacheTier::new(Duration::from_secs(max_age_secs), 0.8)
    }

    /// Loader returning `"{key}-v{n}"` where `n` counts calls, after 100ms.
    fn counting_loader(calls: Arc<AtomicU32>) -> Loader<String, String> {
        Arc::new(move |key: String| {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(format!("{}-v{}", key, n))
            }
            .boxed()
        })
    }

    fn memo(settings: MemoSettings, calls: &Arc<AtomicU32>) -> MemoizedRead<String, String> {
        MemoizedRead::new("services.by_category", settings, counting_loader(Arc::clone(calls)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_then_hit() {
        let calls = Arc::new(AtomicU32::new(0));
        let counters = Arc::new(CacheCounters::new());
        let read = memo(
            MemoSettings::new(tier(60), SLOT).with_counters(Arc::clone(&counters)),
            &calls,
        );

        let first = read.get("detailing".to_string()).await;
        assert_eq!(first.data().map(String::as_str), Some("detailing-v1"));
        assert_eq!(first.attempts(), 1);

        let second = read.get("detailing".to_string()).await;
        assert_eq!(second.data().map(String::as_str), Some("detailing-v1"));
        assert_eq!(second.attempts(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let snap = counters.snapshot();
        assert_eq!(snap.hits, 1);
        assert_eq!(snap.misses, 1);
        assert_eq!(snap.kind(EntityKind::Service).grouped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_max_age() {
        let calls = Arc::new(AtomicU32::new(0));
        let counters = Arc::new(CacheCounters::new());
        let read = memo(
            MemoSettings::new(tier(60), SLOT).with_counters(Arc::clone(&counters)),
            &calls,
        );

        read.get("mot".to_string()).await;
        tokio::time::advance(Duration::from_secs(61)).await;

        let reloaded = read.get("mot".to_string()).await;
        assert_eq!(reloaded.data().map(String::as_str), Some("mot-v2"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(counters.snapshot().kind(EntityKind::Service).grouped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_load() {
        let calls = Arc::new(AtomicU32::new(0));
        let read = memo(MemoSettings::new(tier(60), SLOT), &calls);

        let (a, b, c) = tokio::join!(
            read.get("tyres".to_string()),
            read.get("tyres".to_string()),
            read.get("tyres".to_string()),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.data().map(String::as_str), Some("tyres-v1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_not_cached() {
        let calls = Arc::new(AtomicU32::new(0));
        let loader_calls = Arc::clone(&calls);
        let loader: Loader<String, String> = Arc::new(move |key: String| {
            let n = loader_calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 1 {
                    Err(StorageError::foreign_key_violation("missing parent"))
                } else {
                    Ok(key)
                }
            }
            .boxed()
        });
        let read = MemoizedRead::new("services.by_id", MemoSettings::new(tier(60), SLOT), loader);

        let failed = read.get("a".to_string()).await;
        assert!(!failed.is_success());
        assert_eq!(failed.attempts(), 1);
        assert!(read.is_empty());

        let ok = read.get("a".to_string()).await;
        assert!(ok.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_during_load_discards_result() {
        let calls = Arc::new(AtomicU32::new(0));
        let read = memo(MemoSettings::new(tier(60), SLOT), &calls);

        let background = read.clone();
        let handle = tokio::spawn(async move { background.get("paint".to_string()).await });
        tokio::task::yield_now().await;

        assert!(!read.invalidate(&"paint".to_string()));
        let result = handle.await.expect("load task panicked");

        assert_eq!(result.data().map(String::as_str), Some("paint-v1"));
        assert!(!read.contains(&"paint".to_string()));

        let fresh = read.get("paint".to_string()).await;
        assert_eq!(fresh.data().map(String::as_str), Some("paint-v2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_least_recently_used() {
        let calls = Arc::new(AtomicU32::new(0));
        let counters = Arc::new(CacheCounters::new());
        let read = memo(
            MemoSettings::new(tier(60), SLOT)
                .with_capacity(2)
                .with_counters(Arc::clone(&counters)),
            &calls,
        );

        read.get("a".to_string()).await;
        read.get("b".to_string()).await;
        read.get("a".to_string()).await;
        read.get("c".to_string()).await;

        assert_eq!(read.len(), 2);
        assert!(read.contains(&"a".to_string()));
        assert!(!read.contains(&"b".to_string()));
        assert_eq!(counters.snapshot().kind(EntityKind::Service).grouped, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_and_invalidate_adjust_counts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counters = Arc::new(CacheCounters::new());
        let read = memo(
            MemoSettings::new(tier(60), SLOT).with_counters(Arc::clone(&counters)),
            &calls,
        );

        read.get("a".to_string()).await;
        read.get("b".to_string()).await;
        read.get("c".to_string()).await;

        assert!(read.invalidate(&"a".to_string()));
        assert!(!read.invalidate(&"a".to_string()));
        assert_eq!(counters.snapshot().kind(EntityKind::Service).grouped, 2);

        assert_eq!(read.clear(), 2);
        assert!(read.is_empty());
        assert_eq!(counters.snapshot().kind(EntityKind::Service).grouped, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let calls = Arc::new(AtomicU32::new(0));
        let read = memo(MemoSettings::new(tier(60), SLOT), &calls);

        read.get("old".to_string()).await;
        tokio::time::advance(Duration::from_secs(45)).await;
        read.get("new".to_string()).await;
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(read.purge_expired(), 1);
        assert!(read.contains(&"new".to_string()));
        assert!(!read.contains(&"old".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_refresh_serves_stale_then_updates() {
        let calls = Arc::new(AtomicU32::new(0));
        let read = memo(
            MemoSettings::new(CacheTier::new(Duration::from_secs(10), 0.5), SLOT)
                .with_background_refresh(true),
            &calls,
        );

        read.get("valet".to_string()).await;
        tokio::time::advance(Duration::from_secs(6)).await;

        let stale = read.get("valet".to_string()).await;
        assert_eq!(stale.data().map(String::as_str), Some("valet-v1"));
        assert_eq!(stale.attempts(), 0);

        // Let the refresh task run to completion.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let refreshed = read.get("valet".to_string()).await;
        assert_eq!(refreshed.data().map(String::as_str), Some("valet-v2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_starts_only_past_threshold() {
        let calls = Arc::new(AtomicU32::new(0));
        let read = memo(
            MemoSettings::new(CacheTier::new(Duration::from_secs(10), 0.5), SLOT)
                .with_background_refresh(true),
            &calls,
        );

        read.get("valet".to_string()).await;
        // Stored at t=100ms once the loader finishes; the read below is at exactly half the max age.
        tokio::time::advance(Duration::from_secs(5)).await;
        read.get("valet".to_string()).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Now 200ms past the threshold.
        read.get("valet".to_string()).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_passive_ttl_does_not_refresh_early() {
        let calls = Arc::new(AtomicU32::new(0));
        let read = memo(
            MemoSettings::new(CacheTier::new(Duration::from_secs(10), 0.5), SLOT),
            &calls,
        );

        read.get("valet".to_string()).await;
        tokio::time::advance(Duration::from_secs(6)).await;
        read.get("valet".to_string()).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_change_visible_only_after_max_age() {
        let source = Arc::new(std::sync::Mutex::new("V1".to_string()));
        let reader = Arc::clone(&source);
        let loader: Loader<(), String> = Arc::new(move |_: ()| {
            let value = reader.lock().map(|v| v.clone()).unwrap_or_default();
            async move { Ok(value) }.boxed()
        });
        let read = MemoizedRead::new(
            "services.all",
            MemoSettings::new(CacheTier::new(Duration::from_secs(5), 0.8), SLOT),
            loader,
        );

        assert_eq!(read.get(()).await.data().map(String::as_str), Some("V1"));

        tokio::time::advance(Duration::from_secs(1)).await;
        *source.lock().unwrap() = "V2".to_string();

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(read.get(()).await.data().map(String::as_str), Some("V1"));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(read.get(()).await.data().map(String::as_str), Some("V2"));
    }

    #[test]
    fn test_unit_key_has_no_label() {
        assert_eq!(().label(), None);
        assert_eq!("suv".to_string().label().as_deref(), Some("suv"));
    }
}
