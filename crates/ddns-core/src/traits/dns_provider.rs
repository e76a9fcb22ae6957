// # DNS Provider Trait
//
// Defines the interface for reading and rewriting address records through a
// provider API.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::{Credential, DnsProvider};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//     let token = Credential::new("api-token");
//
//     // Registration: resolve identifiers once
//     let zone_id = provider.resolve_zone(&token, "example.com").await?;
//     let record_id = provider.resolve_record(&token, &zone_id, "home.example.com").await?;
//
//     // Reconciliation: read, compare, write
//     let live = provider.read_current_value(&token, &zone_id, &record_id).await?;
//     provider.write_value(&token, &zone_id, &record_id, "203.0.113.7".parse()?, false).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;

use crate::records::Credential;

/// Trait for DNS provider implementations
///
/// Every call is a single authenticated request addressed by the record's
/// resolved identifiers. Credentials are passed per call because each
/// record carries its own.
///
/// # Rules
///
/// - No retries and no backoff. Return the error; the next scheduled pass
///   is the retry.
/// - No caching between calls. The engine decides whether a write is needed.
/// - Never log credential values.
///
/// # Errors
///
/// - [`crate::Error::Network`]: unreachable, timed out, rate limited or 5xx
/// - [`crate::Error::Provider`]: the provider answered and declined; the
///   provider's own message is preserved
/// - [`crate::Error::NotFound`]: zone or record does not exist
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Find the zone id for a domain suffix such as `example.com`
    async fn resolve_zone(
        &self,
        credential: &Credential,
        domain_suffix: &str,
    ) -> Result<String, crate::Error>;

    /// Find the record id of an existing address record within a zone
    async fn resolve_record(
        &self,
        credential: &Credential,
        zone_id: &str,
        record_name: &str,
    ) -> Result<String, crate::Error>;

    /// Read the address the provider currently serves for a record
    async fn read_current_value(
        &self,
        credential: &Credential,
        zone_id: &str,
        record_id: &str,
    ) -> Result<IpAddr, crate::Error>;

    /// Replace the record's address
    ///
    /// The record type follows the address family (A for IPv4, AAAA for
    /// IPv6).
    async fn write_value(
        &self,
        credential: &Credential,
        zone_id: &str,
        record_id: &str,
        address: IpAddr,
        proxied: bool,
    ) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
