// # Record Set
//
// Shared, lock-guarded view of the inventory.
//
// ## Locking
//
// One async read-write lock guards the whole inventory. Structural edits
// (insert, remove) and field edits take it as writers. Reconciliation never
// holds it across a network call: a pass copies the records it needs under
// the read lock, talks to the provider without any lock, then merges the
// applied address back by name with `record_applied`. A record removed in the
// meantime is simply not found by the merge.

use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::{Inventory, MAX_UPDATE_INTERVAL_MINUTES, SettingsUpdate};
use crate::error::{Error, Result};
use crate::records::{Record, RecordUpdate};

/// Cloneable handle to the shared inventory
#[derive(Debug, Clone)]
pub struct RecordSet {
    inner: Arc<RwLock<Inventory>>,
}

impl RecordSet {
    /// Wrap an inventory
    pub fn new(inventory: Inventory) -> Self {
        Self {
            inner: Arc::new(RwLock::new(inventory)),
        }
    }

    /// Copy of the full inventory, for persisting
    pub async fn snapshot(&self) -> Inventory {
        self.inner.read().await.clone()
    }

    /// All records, in iteration order
    pub async fn list(&self) -> Vec<Record> {
        self.inner.read().await.records.clone()
    }

    /// Enabled records, in iteration order
    pub async fn enabled_records(&self) -> Vec<Record> {
        let guard = self.inner.read().await;
        guard
            .records
            .iter()
            .filter(|record| record.enabled)
            .cloned()
            .collect()
    }

    /// Number of records
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Whether the set holds no records
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }

    /// Number of enabled records
    pub async fn enabled_count(&self) -> usize {
        let guard = self.inner.read().await;
        guard.records.iter().filter(|record| record.enabled).count()
    }

    /// Look up a record by name
    pub async fn get(&self, name: &str) -> Result<Record> {
        let guard = self.inner.read().await;
        guard
            .records
            .iter()
            .find(|record| record.name == name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("record not found: {}", name)))
    }

    /// Whether a record with this name exists
    pub async fn contains(&self, name: &str) -> bool {
        let guard = self.inner.read().await;
        guard.records.iter().any(|record| record.name == name)
    }

    /// Append a resolved record
    ///
    /// Fails with `AlreadyExists` when the name is taken and `InvalidInput`
    /// when the record's identifiers are not both populated.
    pub async fn insert(&self, record: Record) -> Result<()> {
        if !record.is_resolved() {
            return Err(Error::invalid_input(format!(
                "record {} has unresolved zone or record ID",
                record.name
            )));
        }

        let mut guard = self.inner.write().await;
        if guard.records.iter().any(|existing| existing.name == record.name) {
            return Err(Error::already_exists(format!(
                "record already exists: {}",
                record.name
            )));
        }
        guard.records.push(record);
        Ok(())
    }

    /// Remove a record by name, returning it
    pub async fn remove(&self, name: &str) -> Result<Record> {
        let mut guard = self.inner.write().await;
        let index = guard
            .records
            .iter()
            .position(|record| record.name == name)
            .ok_or_else(|| Error::not_found(format!("record not found: {}", name)))?;
        Ok(guard.records.remove(index))
    }

    /// Apply a partial edit, returning the edited record
    pub async fn update(&self, name: &str, update: RecordUpdate) -> Result<Record> {
        let mut guard = self.inner.write().await;
        let record = guard
            .records
            .iter_mut()
            .find(|record| record.name == name)
            .ok_or_else(|| Error::not_found(format!("record not found: {}", name)))?;

        if let Some(proxied) = update.proxied {
            record.proxied = proxied;
        }
        if let Some(notes) = update.notes {
            record.notes = notes.trim().to_string();
        }
        if let Some(enabled) = update.enabled {
            record.enabled = enabled;
        }

        Ok(record.clone())
    }

    /// Flip the enabled flag, returning the new value
    pub async fn toggle(&self, name: &str) -> Result<bool> {
        let mut guard = self.inner.write().await;
        let record = guard
            .records
            .iter_mut()
            .find(|record| record.name == name)
            .ok_or_else(|| Error::not_found(format!("record not found: {}", name)))?;

        record.enabled = !record.enabled;
        Ok(record.enabled)
    }

    /// Merge an applied update into the live record
    ///
    /// Returns `false` if the record no longer exists.
    pub async fn record_applied(&self, name: &str, address: IpAddr, at: DateTime<Utc>) -> bool {
        let mut guard = self.inner.write().await;
        match guard.records.iter_mut().find(|record| record.name == name) {
            Some(record) => {
                record.last_ip = Some(address);
                record.last_updated = Some(at);
                true
            }
            None => false,
        }
    }

    /// Current settings (the inventory without its records)
    pub async fn settings(&self) -> Inventory {
        let guard = self.inner.read().await;
        Inventory {
            records: Vec::new(),
            ..guard.clone()
        }
    }

    /// Apply a settings edit
    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<()> {
        if let Some(interval) = update.update_interval {
            if !(1..=MAX_UPDATE_INTERVAL_MINUTES).contains(&interval) {
                return Err(Error::invalid_input(format!(
                    "update interval must be between 1 and {} minutes. Got: {}",
                    MAX_UPDATE_INTERVAL_MINUTES, interval
                )));
            }
        }

        let mut guard = self.inner.write().await;
        if let Some(interval) = update.update_interval {
            guard.update_interval = interval;
        }
        if let Some(auto_update) = update.auto_update {
            guard.auto_update = auto_update;
        }
        if let Some(token) = update.default_api_token {
            guard.default_api_token = token;
        }
        Ok(())
    }
}
