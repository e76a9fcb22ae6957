//! Core traits for the DDNS system
//!
//! This module defines the seams between the engine and the outside world.
//!
//! - [`DnsProvider`]: Resolve and rewrite records via a provider API
//! - [`AddressResolver`]: Discover the host's current public address
//! - [`RecordStore`]: Durable load and save of the record set

pub mod address_resolver;
pub mod dns_provider;
pub mod record_store;

pub use address_resolver::AddressResolver;
pub use dns_provider::DnsProvider;
pub use record_store::RecordStore;
