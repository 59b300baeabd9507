//! Storage collaborator seam.
//!
//! The caches never talk to a database directly; they call an
//! [`EntityStore`]. [`MemoryStore`] is the in-process implementation used by
//! the API binary and the tests.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use motorway_core::{CatalogEntity, EntityId, StorageError, StorageResult};

/// Backing storage for one entity family.
#[async_trait]
pub trait EntityStore<T: CatalogEntity>: Send + Sync {
    /// Every entity, in id order.
    async fn list(&self) -> StorageResult<Vec<T>>;

    /// Look up one entity. `Ok(None)` means it does not exist.
    async fn get(&self, id: EntityId) -> StorageResult<Option<T>>;

    /// Every entity whose grouping attribute equals `group`.
    async fn list_by_group(&self, group: &str) -> StorageResult<Vec<T>>;

    /// Insert or replace. Returns the previous value, if any.
    async fn save(&self, entity: T) -> StorageResult<Option<T>>;

    /// Remove. Returns the removed value, if any.
    async fn delete(&self, id: EntityId) -> StorageResult<Option<T>>;
}

/// In-memory [`EntityStore`] keyed by id.
#[derive(Debug)]
pub struct MemoryStore<T> {
    rows: RwLock<BTreeMap<EntityId, T>>,
}

impl<T: CatalogEntity> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CatalogEntity> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    /// Build a store pre-populated with `rows`.
    pub fn with_rows(rows: impl IntoIterator<Item = T>) -> Self {
        Self {
            rows: RwLock::new(rows.into_iter().map(|row| (row.id(), row)).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, BTreeMap<EntityId, T>>> {
        self.rows
            .read()
            .map_err(|_| StorageError::new(format!("{} store lock poisoned", T::kind())))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, BTreeMap<EntityId, T>>> {
        self.rows
            .write()
            .map_err(|_| StorageError::new(format!("{} store lock poisoned", T::kind())))
    }
}

#[async_trait]
impl<T: CatalogEntity> EntityStore<T> for MemoryStore<T> {
    async fn list(&self) -> StorageResult<Vec<T>> {
        Ok(self.read()?.values().cloned().collect())
    }

    async fn get(&self, id: EntityId) -> StorageResult<Option<T>> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn list_by_group(&self, group: &str) -> StorageResult<Vec<T>> {
        Ok(self
            .read()?
            .values()
            .filter(|row| row.group() == group)
            .cloned()
            .collect())
    }

    async fn save(&self, entity: T) -> StorageResult<Option<T>> {
        Ok(self.write()?.insert(entity.id(), entity))
    }

    async fn delete(&self, id: EntityId) -> StorageResult<Option<T>> {
        Ok(self.write()?.remove(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use motorway_core::{new_entity_id, Car};

    fn car(category: &str) -> Car {
        Car {
            id: new_entity_id(),
            make: "Volvo".to_string(),
            model: "XC60".to_string(),
            year: 2021,
            category: category.to_string(),
            price_cents: 3_150_000,
            mileage_km: 42_000,
            listed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_get_delete() -> StorageResult<()> {
        let store: MemoryStore<Car> = MemoryStore::new();
        let suv = car("suv");

        assert_eq!(store.save(suv.clone()).await?, None);
        assert_eq!(store.get(suv.id).await?, Some(suv.clone()));
        assert_eq!(store.delete(suv.id).await?, Some(suv.clone()));
        assert_eq!(store.get(suv.id).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_returns_previous() -> StorageResult<()> {
        let mut suv = car("suv");
        let store = MemoryStore::with_rows([suv.clone()]);

        suv.category = "estate".to_string();
        let previous = store.save(suv.clone()).await?;
        assert_eq!(previous.map(|c| c.category), Some("suv".to_string()));
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_by_group() -> StorageResult<()> {
        let store = MemoryStore::with_rows([car("suv"), car("sedan"), car("suv")]);

        assert_eq!(store.list().await?.len(), 3);
        assert_eq!(store.list_by_group("suv").await?.len(), 2);
        assert!(store.list_by_group("coupe").await?.is_empty());
        Ok(())
    }
}
