//! Storage contract consumed by the handlers, plus an in-memory backend.

use crate::error::StorageError;
use crate::resource::Resource;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Predicate applied by `get_all`.
pub type FilterFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Per-resource-type persistence. Implementations must be safe for concurrent use;
/// no locking happens around these calls.
#[async_trait]
pub trait Storage<T: Resource>: Send + Sync + 'static {
    /// Returns `StorageError::NotFound` when no resource has this id.
    async fn get(&self, id: &str) -> Result<T, StorageError>;
    async fn get_all(&self, filter: Option<FilterFn<T>>) -> Result<Vec<T>, StorageError>;
    async fn set(&self, resource: T) -> Result<(), StorageError>;
    async fn delete(&self, id: &str) -> Result<(), StorageError>;
}

/// Map-backed storage ordered by id.
pub struct MemoryStorage<T> {
    items: RwLock<BTreeMap<String, T>>,
}

impl<T> MemoryStorage<T> {
    pub fn new() -> Self {
        MemoryStorage {
            items: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl<T> Default for MemoryStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Resource> Storage<T> for MemoryStorage<T> {
    async fn get(&self, id: &str) -> Result<T, StorageError> {
        self.items.read().get(id).cloned().ok_or(StorageError::NotFound)
    }

    async fn get_all(&self, filter: Option<FilterFn<T>>) -> Result<Vec<T>, StorageError> {
        let items = self.items.read();
        Ok(items
            .values()
            .filter(|item| filter.as_ref().map_or(true, |f| f(item)))
            .cloned()
            .collect())
    }

    async fn set(&self, resource: T) -> Result<(), StorageError> {
        self.items.write().insert(resource.id(), resource);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.items
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{DefaultResource, Id};

    fn item(id: &str) -> DefaultResource {
        DefaultResource { id: Id::from(id) }
    }

    #[tokio::test]
    async fn set_get_delete() {
        let store = MemoryStorage::new();
        store.set(item("a")).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), item("a"));
        assert_eq!(store.len(), 1);

        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await, Err(StorageError::NotFound));
        assert_eq!(store.delete("a").await, Err(StorageError::NotFound));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn get_all_filters_in_id_order() {
        let store = MemoryStorage::new();
        for id in ["c", "a", "b"] {
            store.set(item(id)).await.unwrap();
        }
        let all = store.get_all(None).await.unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, ["a", "b", "c"]);

        let not_b: FilterFn<DefaultResource> = Arc::new(|r| r.id.as_str() != "b");
        let filtered = store.get_all(Some(not_b)).await.unwrap();
        assert_eq!(filtered.len(), 2);
    }
}
