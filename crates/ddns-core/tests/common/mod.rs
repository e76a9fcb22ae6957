//! Test doubles and common utilities for contract tests
//!
//! The doubles are cheap to clone; clones share counters and state, so a test
//! keeps one handle and gives another to the engine.

#![allow(dead_code)]

use ddns_core::config::{EngineConfig, Inventory};
use ddns_core::error::{Error, Result};
use ddns_core::records::{Credential, Record, RecordSet};
use ddns_core::traits::{AddressResolver, DnsProvider, RecordStore};
use ddns_core::{MemoryRecordStore, Reconciler};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ZONE_ID: &str = "zone-example-com";

/// How the mock provider fails a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFailure {
    Network,
    Rejected,
}

/// In-memory provider: record id -> served address
#[derive(Clone, Default)]
pub struct MockDnsProvider {
    served: Arc<Mutex<HashMap<String, IpAddr>>>,
    proxied: Arc<Mutex<HashMap<String, bool>>>,
    known_records: Arc<Mutex<HashMap<String, String>>>,
    read_calls: Arc<AtomicUsize>,
    write_calls: Arc<AtomicUsize>,
    lookup_calls: Arc<AtomicUsize>,
    fail_reads: Arc<AtomicBool>,
    write_failure: Arc<Mutex<Option<WriteFailure>>>,
    write_delay: Arc<Mutex<Option<Duration>>>,
    hang_writes: Arc<AtomicBool>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the provider serve `address` for `record_id`
    pub fn serve(&self, record_id: &str, address: IpAddr) {
        self.served
            .lock()
            .unwrap()
            .insert(record_id.to_string(), address);
    }

    /// Address currently served for `record_id`
    pub fn served(&self, record_id: &str) -> Option<IpAddr> {
        self.served.lock().unwrap().get(record_id).copied()
    }

    /// Proxy flag sent with the last successful write to `record_id`
    pub fn written_proxied(&self, record_id: &str) -> Option<bool> {
        self.proxied.lock().unwrap().get(record_id).copied()
    }

    /// Make `record_name` resolvable during registration
    pub fn know_record(&self, record_name: &str, record_id: &str) {
        self.known_records
            .lock()
            .unwrap()
            .insert(record_name.to_string(), record_id.to_string());
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, failure: Option<WriteFailure>) {
        *self.write_failure.lock().unwrap() = failure;
    }

    /// Delay every write; the delay runs on the tokio clock
    pub fn slow_writes(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = Some(delay);
    }

    pub fn hang_writes(&self) {
        self.hang_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn resolve_zone(&self, _credential: &Credential, domain_suffix: &str) -> Result<String> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        if domain_suffix == "example.com" {
            Ok(ZONE_ID.to_string())
        } else {
            Err(Error::not_found(format!("zone not found: {}", domain_suffix)))
        }
    }

    async fn resolve_record(
        &self,
        _credential: &Credential,
        _zone_id: &str,
        record_name: &str,
    ) -> Result<String> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.known_records
            .lock()
            .unwrap()
            .get(record_name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("DNS record not found: {}", record_name)))
    }

    async fn read_current_value(
        &self,
        _credential: &Credential,
        _zone_id: &str,
        record_id: &str,
    ) -> Result<IpAddr> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::network("connection reset by peer"));
        }
        self.served(record_id)
            .ok_or_else(|| Error::not_found(format!("record {} not found", record_id)))
    }

    async fn write_value(
        &self,
        _credential: &Credential,
        _zone_id: &str,
        record_id: &str,
        address: IpAddr,
        proxied: bool,
    ) -> Result<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);

        if self.hang_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = *self.write_failure.lock().unwrap();
        match failure {
            Some(WriteFailure::Network) => Err(Error::network("HTTP request failed: timed out")),
            Some(WriteFailure::Rejected) => Err(Error::provider(
                "mock",
                "API error: Authentication error (code 10000)",
            )),
            None => {
                self.serve(record_id, address);
                self.proxied
                    .lock()
                    .unwrap()
                    .insert(record_id.to_string(), proxied);
                Ok(())
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Resolver returning a settable address
#[derive(Clone)]
pub struct StaticResolver {
    address: Arc<Mutex<IpAddr>>,
    calls: Arc<AtomicUsize>,
}

impl StaticResolver {
    pub fn new(address: IpAddr) -> Self {
        Self {
            address: Arc::new(Mutex::new(address)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set(&self, address: IpAddr) {
        *self.address.lock().unwrap() = address;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AddressResolver for StaticResolver {
    async fn current(&self) -> Result<IpAddr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.address.lock().unwrap())
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

/// Resolver that always fails
pub struct FailingResolver;

#[async_trait::async_trait]
impl AddressResolver for FailingResolver {
    async fn current(&self) -> Result<IpAddr> {
        Err(Error::network("all address services failed"))
    }
}

/// Resolver that never answers
pub struct HangingResolver;

#[async_trait::async_trait]
impl AddressResolver for HangingResolver {
    async fn current(&self) -> Result<IpAddr> {
        std::future::pending().await
    }
}

/// Record store whose saves always fail
#[derive(Clone, Default)]
pub struct FailingRecordStore {
    attempts: Arc<AtomicUsize>,
}

impl FailingRecordStore {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RecordStore for FailingRecordStore {
    async fn load(&self) -> Result<Inventory> {
        Ok(Inventory::new())
    }

    async fn save(&self, _inventory: &Inventory) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::persistence("No space left on device"))
    }
}

pub fn ip(text: &str) -> IpAddr {
    text.parse().unwrap()
}

/// An enabled record with both identifiers resolved
pub fn resolved_record(name: &str, record_id: &str) -> Record {
    Record::new(name, Credential::new("test-token")).with_target(ZONE_ID, record_id)
}

pub fn record_set(records: Vec<Record>) -> RecordSet {
    let mut inventory = Inventory::new();
    inventory.records = records;
    RecordSet::new(inventory)
}

/// Engine over the given doubles with the default call deadline
pub fn reconciler(
    provider: &MockDnsProvider,
    resolver: impl AddressResolver + 'static,
    store: impl RecordStore + 'static,
    records: Vec<Record>,
) -> Reconciler {
    Reconciler::new(
        Box::new(provider.clone()),
        Box::new(resolver),
        Box::new(store),
        record_set(records),
        EngineConfig::default(),
    )
}

/// Engine with a memory store, returning the store handle too
pub fn reconciler_with_memory_store(
    provider: &MockDnsProvider,
    resolver: impl AddressResolver + 'static,
    records: Vec<Record>,
) -> (Reconciler, MemoryRecordStore) {
    let store = MemoryRecordStore::new();
    let engine = reconciler(provider, resolver, store.clone(), records);
    (engine, store)
}
