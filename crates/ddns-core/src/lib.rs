// # ddns-core
//
// Core library for the reconciliation-based DDNS system.
//
// ## Architecture Overview
//
// This library provides the core functionality for keeping DNS records
// pointed at the host's current public address:
// - **DnsProvider**: Trait for resolving and rewriting records via a provider API
// - **AddressResolver**: Trait for discovering the current public address
// - **RecordStore**: Trait for durable storage of the record set
// - **Reconciler**: Compares desired and actual addresses and corrects drift
// - **RecordSet**: Shared, lock-guarded inventory of managed records
// - **SessionStore / RateLimiter**: Access control for the control surface
// - **Scheduler**: Periodic triggers with deterministic stop
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from provider and resolver adapters
// 2. **Failures are outcomes**: One record's problem never aborts a pass
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Idempotency**: Nothing is written when the provider already serves the desired address

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod records;
pub mod scheduler;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use auth::{LoginGuard, RateLimiter, SessionStore};
pub use config::{EngineConfig, Inventory, SettingsUpdate};
pub use engine::{OutcomeKind, OutcomeTarget, ReconciliationOutcome, Reconciler};
pub use error::{Error, FailureKind, Result};
pub use records::{Credential, Record, RecordSet, RecordUpdate};
pub use scheduler::Scheduler;
pub use state::{FileRecordStore, MemoryRecordStore};
pub use traits::{AddressResolver, DnsProvider, RecordStore};
