// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// Nothing survives a restart. Useful for tests and for embedding the engine
// where the caller owns persistence.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::config::Inventory;
use crate::error::Error;
use crate::traits::RecordStore;

/// In-memory record store
///
/// Clones share the same slot, so a test can keep one handle and hand
/// another to the engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<Option<Inventory>>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryRecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds an inventory
    pub fn with_inventory(inventory: Inventory) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(inventory))),
            saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Last saved inventory, if any
    pub async fn saved(&self) -> Option<Inventory> {
        self.inner.read().await.clone()
    }

    /// Number of completed saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn load(&self) -> Result<Inventory, Error> {
        Ok(self.inner.read().await.clone().unwrap_or_default())
    }

    async fn save(&self, inventory: &Inventory) -> Result<(), Error> {
        *self.inner.write().await = Some(inventory.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryRecordStore::new();
        assert!(store.saved().await.is_none());
        assert_eq!(store.load().await.unwrap().records.len(), 0);

        let mut inventory = Inventory::new();
        inventory.update_interval = 10;
        store.save(&inventory).await.unwrap();

        let handle = store.clone();
        assert_eq!(handle.load().await.unwrap().update_interval, 10);
        assert_eq!(handle.save_count(), 1);
    }
}
