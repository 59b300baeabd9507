//! Cache entry and lookup counters.
//!
//! Counts are approximate: they track inserts and removals performed through
//! the caches, not a scan of live entries. All fields sit behind one mutex so a
//! reset or a snapshot is never observed half-applied.

use std::sync::{Mutex, MutexGuard};

use motorway_core::EntityKind;
use serde::Serialize;

/// Shape of a cached read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheShape {
    /// Whole-collection read.
    Bulk,
    /// Lookup by id.
    Individual,
    /// Lookup by grouping attribute.
    Grouped,
}

/// Which counter a cache reports into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CounterSlot {
    pub kind: EntityKind,
    pub shape: CacheShape,
}

impl CounterSlot {
    pub fn new(kind: EntityKind, shape: CacheShape) -> Self {
        Self { kind, shape }
    }
}

/// Entry counts for one entity family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub bulk: u64,
    pub individual: u64,
    pub grouped: u64,
}

impl KindCounts {
    fn slot_mut(&mut self, shape: CacheShape) -> &mut u64 {
        match shape {
            CacheShape::Bulk => &mut self.bulk,
            CacheShape::Individual => &mut self.individual,
            CacheShape::Grouped => &mut self.grouped,
        }
    }

    pub fn total(&self) -> u64 {
        self.bulk + self.individual + self.grouped
    }
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub kinds: [KindCounts; 3],
    pub hits: u64,
    pub misses: u64,
}

impl CounterSnapshot {
    pub fn kind(&self, kind: EntityKind) -> KindCounts {
        self.kinds[kind.index()]
    }

    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Hit percentage, `None` when nothing has been looked up yet.
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.lookups();
        if total == 0 {
            None
        } else {
            Some(self.hits as f64 / total as f64 * 100.0)
        }
    }
}

/// Counter store shared by every cache a [`CacheManager`](crate::CacheManager) owns.
#[derive(Debug, Default)]
pub struct CacheCounters {
    state: Mutex<CounterSnapshot>,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CounterSnapshot> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_hit(&self) {
        self.lock().hits += 1;
    }

    pub fn record_miss(&self) {
        self.lock().misses += 1;
    }

    pub fn increment(&self, slot: CounterSlot) {
        let mut state = self.lock();
        *state.kinds[slot.kind.index()].slot_mut(slot.shape) += 1;
    }

    /// Decrease a counter, never going below zero.
    pub fn decrement(&self, slot: CounterSlot, by: u64) {
        if by == 0 {
            return;
        }
        let mut state = self.lock();
        let counter = state.kinds[slot.kind.index()].slot_mut(slot.shape);
        *counter = counter.saturating_sub(by);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        *self.lock()
    }

    /// Zero every entry count and the hit/miss totals.
    pub fn reset(&self) {
        *self.lock() = CounterSnapshot::default();
    }
}
