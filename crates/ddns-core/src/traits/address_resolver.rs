// # Address Resolver Trait
//
// Defines the interface for discovering the host's current public address.
//
// ## Implementations
//
// - HTTP lookup services: `ddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::AddressResolver;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let resolver = /* AddressResolver implementation */;
//     let current = resolver.current().await?;
//     println!("public address: {}", current);
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for public-address discovery
///
/// One call, one answer. Implementations do not cache between calls and
/// do not retry beyond their own list of fallback endpoints; the engine
/// applies the call deadline and decides what a failure means for the
/// pass.
///
/// # Errors
///
/// Unreachable services, timeouts and unparseable answers are reported as
/// [`crate::Error::Network`], which the engine classifies as transient.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Fetch the current public address
    async fn current(&self) -> Result<IpAddr, crate::Error>;

    /// Short name for logging (e.g. "http")
    fn source_name(&self) -> &'static str {
        "resolver"
    }
}
