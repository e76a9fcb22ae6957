//! Reconciliation engine
//!
//! The [`Reconciler`] is responsible for:
//! - Determining the desired address via an [`AddressResolver`]
//! - Reading the provider's live value and comparing
//! - Writing through the [`DnsProvider`] only when they differ
//! - Persisting the record set through a [`RecordStore`]
//!
//! ## Architecture
//!
//! ```text
//!   Scheduler / manual trigger / CLI
//!                 │
//!                 ▼
//!        ┌──────────────────┐        ┌─────────────────┐
//!        │    Reconciler    │◄──────►│    RecordSet    │
//!        └──────────────────┘        └─────────────────┘
//!                 │
//!     ┌───────────┼────────────────────────┐
//!     ▼           ▼                        ▼
//! ┌──────────┐ ┌─────────────┐      ┌─────────────┐
//! │ Resolver │ │ DnsProvider │      │ RecordStore │
//! │ (desired)│ │ (read/write)│      │   (save)    │
//! └──────────┘ └─────────────┘      └─────────────┘
//! ```
//!
//! ## Reconciling one record
//!
//! 1. Disabled → `skipped-disabled`, nothing contacted
//! 2. Resolve the desired address; failure → `failed`, no write
//! 3. Read the provider's current value; failure leaves it unknown
//! 4. Equal → `unchanged`, no write
//! 5. Missing zone id, record id or credential → `failed`, no write
//! 6. Write; success → `updated`
//!
//! ## Concurrency
//!
//! Passes are serialized by a pass lock, so a scheduled pass and a manual
//! trigger never interleave. A pass lists the enabled record names up
//! front, then re-reads each record at its turn: one removed or disabled in
//! the meantime is skipped, and an edited one is reconciled with its current
//! flags. Applied addresses are merged back by name; no lock on the record
//! set is held across a network call. Saves are serialized by their own
//! lock and snapshot the record set while holding it.

mod outcome;

pub use outcome::{OutcomeKind, OutcomeTarget, ReconciliationOutcome};

use chrono::Utc;
use std::future::Future;
use std::net::IpAddr;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, SettingsUpdate};
use crate::error::{Error, FailureKind, Result};
use crate::records::{Credential, Record, RecordSet, RecordUpdate, zone_suffix};
use crate::traits::{AddressResolver, DnsProvider, RecordStore};

/// Core reconciliation engine
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct Reconciler {
    provider: Box<dyn DnsProvider>,
    resolver: Box<dyn AddressResolver>,
    store: Box<dyn RecordStore>,
    records: RecordSet,
    config: EngineConfig,
    pass_lock: Mutex<()>,
    persist_lock: Mutex<()>,
}

impl Reconciler {
    /// Create an engine over an existing record set
    pub fn new(
        provider: Box<dyn DnsProvider>,
        resolver: Box<dyn AddressResolver>,
        store: Box<dyn RecordStore>,
        records: RecordSet,
        config: EngineConfig,
    ) -> Self {
        Self {
            provider,
            resolver,
            store,
            records,
            config,
            pass_lock: Mutex::new(()),
            persist_lock: Mutex::new(()),
        }
    }

    /// Create an engine, loading the record set from the store
    ///
    /// A load failure is returned; the caller decides whether it is fatal.
    pub async fn load(
        provider: Box<dyn DnsProvider>,
        resolver: Box<dyn AddressResolver>,
        store: Box<dyn RecordStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        let inventory = store.load().await?;
        info!(
            "Loaded {} records ({} enabled)",
            inventory.records.len(),
            inventory.records.iter().filter(|r| r.enabled).count()
        );
        Ok(Self::new(
            provider,
            resolver,
            store,
            RecordSet::new(inventory),
            config,
        ))
    }

    /// The shared record set
    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    /// Reconcile every enabled record, in record-set order
    ///
    /// Returns one outcome per record that is still enabled at its turn. If
    /// the save after the pass fails, one more outcome targeted at the
    /// record set is appended.
    pub async fn reconcile_all(&self) -> Vec<ReconciliationOutcome> {
        let _pass = self.pass_lock.lock().await;

        let names: Vec<String> = self
            .records
            .enabled_records()
            .await
            .into_iter()
            .map(|record| record.name)
            .collect();
        debug!("Reconciling {} enabled records", names.len());

        let mut outcomes = Vec::with_capacity(names.len() + 1);
        for name in names {
            // Re-read at this record's turn
            let mut record = match self.records.get(&name).await {
                Ok(record) if record.enabled => record,
                Ok(_) => {
                    debug!("Record {} was disabled during the pass", name);
                    continue;
                }
                Err(_) => {
                    debug!("Record {} was removed during the pass", name);
                    continue;
                }
            };

            let outcome = self.reconcile_one(&mut record).await;
            if outcome.kind == OutcomeKind::Updated {
                self.merge_applied(&record).await;
            }
            outcomes.push(outcome);
        }

        if let Err(e) = self.persist().await {
            warn!("Failed to save record set after pass: {}", e);
            outcomes.push(ReconciliationOutcome::failed(
                OutcomeTarget::RecordSet,
                FailureKind::Persistence,
                format!("failed to save record set: {}", e),
            ));
        }

        outcomes
    }

    /// Reconcile one record by name
    ///
    /// An unknown name yields a `failed` outcome with failure kind `NotFound`.
    /// A failed save after an update is appended to the detail; the outcome
    /// stays `updated` because the DNS change was applied.
    pub async fn reconcile_single(&self, name: &str) -> ReconciliationOutcome {
        let _pass = self.pass_lock.lock().await;

        let mut record = match self.records.get(name).await {
            Ok(record) => record,
            Err(e) => {
                debug!("Single reconciliation for unknown record {}", name);
                return ReconciliationOutcome::failed(
                    OutcomeTarget::Record(name.to_string()),
                    FailureKind::NotFound,
                    e.to_string(),
                );
            }
        };

        let mut outcome = self.reconcile_one(&mut record).await;
        if outcome.kind == OutcomeKind::Updated {
            self.merge_applied(&record).await;
            if let Err(e) = self.persist().await {
                warn!("Failed to save record set after updating {}: {}", name, e);
                outcome
                    .detail
                    .push_str(&format!(" (warning: failed to save record set: {})", e));
            }
        }

        outcome
    }

    /// Reconcile a single record value
    ///
    /// On `updated` the record's applied address and update time are set.
    /// This neither takes the pass lock nor touches the shared record set;
    /// use [`reconcile_all`](Self::reconcile_all) or
    /// [`reconcile_single`](Self::reconcile_single) for that.
    pub async fn reconcile_one(&self, record: &mut Record) -> ReconciliationOutcome {
        if !record.enabled {
            debug!("Record {} is disabled, skipping", record.name);
            return ReconciliationOutcome::skipped_disabled(&record.name);
        }

        let desired = match self.call("address lookup", self.resolver.current()).await {
            Ok(address) => address,
            Err(e) => {
                warn!("Could not determine current address for {}: {}", record.name, e);
                return ReconciliationOutcome::failed(
                    OutcomeTarget::Record(record.name.clone()),
                    FailureKind::TransientNetwork,
                    format!("could not determine current address: {}", e),
                );
            }
        };

        let previous = self.read_previous(record).await;

        if previous == Some(desired) {
            debug!("Record {} already points to {}", record.name, desired);
            return ReconciliationOutcome::unchanged(&record.name, desired);
        }

        if let Err(e) = record.check_write_coordinates() {
            warn!("Record {} cannot be updated: {}", record.name, e);
            return ReconciliationOutcome::from_error(&record.name, &e)
                .with_addresses(Some(desired), previous);
        }

        let write = self.provider.write_value(
            &record.api_token,
            &record.zone_id,
            &record.record_id,
            desired,
            record.proxied,
        );
        if let Err(e) = self.call("record update", write).await {
            warn!(
                "Failed to update {} via {}: {}",
                record.name,
                self.provider.provider_name(),
                e
            );
            return ReconciliationOutcome::from_error(&record.name, &e)
                .with_addresses(Some(desired), previous);
        }

        record.last_ip = Some(desired);
        record.last_updated = Some(Utc::now());
        info!(
            "Updated {} -> {} (previous: {:?})",
            record.name, desired, previous
        );
        ReconciliationOutcome::updated(&record.name, desired, previous)
    }

    /// Register a new record, resolving its provider identifiers
    ///
    /// The zone is looked up by the name's last two labels. Nothing is
    /// inserted unless both identifiers resolve.
    pub async fn register_record(
        &self,
        name: &str,
        credential: Credential,
        proxied: bool,
        notes: &str,
    ) -> Result<Record> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_input("record name is required"));
        }
        if credential.is_empty() {
            return Err(Error::invalid_input("API token is required"));
        }
        if self.records.contains(name).await {
            return Err(Error::already_exists(format!("record already exists: {}", name)));
        }

        let suffix = zone_suffix(name)?;
        let zone_id = self
            .call("zone lookup", self.provider.resolve_zone(&credential, &suffix))
            .await?;
        let record_id = self
            .call(
                "record lookup",
                self.provider.resolve_record(&credential, &zone_id, name),
            )
            .await?;

        let mut record = Record::new(name, credential)
            .with_target(zone_id, record_id)
            .with_proxied(proxied)
            .with_notes(notes.trim());
        record.created_at = Some(Utc::now());

        self.records.insert(record.clone()).await?;
        self.persist().await?;

        info!("Registered record {} (zone {})", record.name, record.zone_id);
        Ok(record)
    }

    /// Edit a record's proxy flag, note or enabled flag
    pub async fn update_record(&self, name: &str, update: RecordUpdate) -> Result<Record> {
        let record = self.records.update(name, update).await?;
        self.persist().await?;
        Ok(record)
    }

    /// Flip a record's enabled flag, returning the new value
    pub async fn toggle_record(&self, name: &str) -> Result<bool> {
        let enabled = self.records.toggle(name).await?;
        self.persist().await?;
        info!(
            "Record {} {}",
            name,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(enabled)
    }

    /// Remove a record
    pub async fn remove_record(&self, name: &str) -> Result<Record> {
        let record = self.records.remove(name).await?;
        self.persist().await?;
        info!("Removed record {}", name);
        Ok(record)
    }

    /// Edit the global settings
    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<()> {
        self.records.update_settings(update).await?;
        self.persist().await
    }

    /// Save the record set
    pub async fn persist(&self) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.records.snapshot().await;
        self.store.save(&snapshot).await
    }

    async fn read_previous(&self, record: &Record) -> Option<IpAddr> {
        if !record.is_resolved() || record.api_token.is_empty() {
            return None;
        }

        let read = self.provider.read_current_value(
            &record.api_token,
            &record.zone_id,
            &record.record_id,
        );
        match self.call("record read", read).await {
            Ok(address) => Some(address),
            Err(e) => {
                warn!(
                    "Could not read current value of {}: {}; treating it as unknown",
                    record.name, e
                );
                None
            }
        }
    }

    async fn merge_applied(&self, record: &Record) {
        if let (Some(address), Some(at)) = (record.last_ip, record.last_updated) {
            if !self.records.record_applied(&record.name, address, at).await {
                debug!("Record {} was removed during the pass", record.name);
            }
        }
    }

    /// Run one outbound call under the per-call deadline
    async fn call<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let limit = self.config.call_timeout();
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::network(format!(
                "{} timed out after {}s",
                what,
                limit.as_secs()
            ))),
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("provider", &self.provider.provider_name())
            .field("resolver", &self.resolver.source_name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
