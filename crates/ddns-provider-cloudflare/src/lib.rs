// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare DNS provider implementation for the DDNS system.
//
// ## Behavior
//
// - One HTTP request per trait call
// - Errors propagate to the engine; no retry, no backoff, no caching
// - HTTP timeout configured (30 seconds)
// - Status codes mapped to failure classes (401/403/409 rejected, 404 not found,
//   429/5xx transient)
// - `success: false` envelopes are rejected with Cloudflare's own messages
// - Dry-run mode: reads go out, writes are only logged
// - A and AAAA records, chosen by address family
//
// ## Security Requirements
//
// - Credentials arrive per call and NEVER appear in logs or error messages
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...`
// - DNS Record Details: GET `/zones/:zone_id/dns_records/:record_id`
// - Update DNS Record: PATCH `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ddns_core::records::Credential;
use ddns_core::traits::DnsProvider;
use ddns_core::{Error, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::net::IpAddr;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// TTL value meaning "automatic"
const AUTO_TTL: u32 = 1;

const PROVIDER: &str = "cloudflare";

/// Cloudflare DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone lookup, record lookup, record read)
/// - Log the intended PATCH payload
/// - **NOT** actually modify DNS records
pub struct CloudflareProvider {
    /// HTTP client for API requests
    client: reqwest::Client,

    /// API root, overridable for tests
    base_url: String,

    /// Dry-run mode: if true, perform GET requests but skip writes
    dry_run: bool,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// Standard Cloudflare response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    content: String,
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    pub fn new(dry_run: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            dry_run,
        })
    }

    /// Create a provider in live mode
    pub fn new_live() -> Result<Self> {
        Self::new(false)
    }

    /// Create a provider in dry-run mode
    pub fn new_dry_run() -> Result<Self> {
        Self::new(true)
    }

    /// Create a provider, taking dry-run mode from `DDNS_MODE`
    pub fn from_env() -> Result<Self> {
        let mode = std::env::var("DDNS_MODE").unwrap_or_default();
        let dry_run = is_dry_run_mode(&mode);
        if dry_run {
            tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
        }
        Self::new(dry_run)
    }

    /// Point the provider at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder, credential: &Credential) -> Result<RequestBuilder> {
        if credential.is_empty() {
            return Err(Error::incomplete(
                "missing API token - record configuration incomplete",
            ));
        }
        Ok(request
            .bearer_auth(credential.expose())
            .header("Content-Type", "application/json"))
    }

    /// Send a request and unwrap the response envelope
    ///
    /// `not_found` builds the error for a 404.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
        not_found: impl FnOnce() -> Error,
    ) -> Result<Option<T>> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::network(format!("HTTP request failed: {}", e.without_url())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::network(format!("Failed to read response: {}", e.without_url())))?;

        if !status.is_success() {
            return Err(status_error(status, &body, context, not_found));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            Error::provider(PROVIDER, format!("{}: failed to parse response: {}", context, e))
        })?;

        if !envelope.success {
            return Err(Error::provider(
                PROVIDER,
                format!("{}: {}", context, describe(&envelope.errors)),
            ));
        }

        Ok(envelope.result)
    }
}

/// Map a non-success status to an error
fn status_error(
    status: StatusCode,
    body: &str,
    context: &str,
    not_found: impl FnOnce() -> Error,
) -> Error {
    let details = serde_json::from_str::<Envelope<serde_json::Value>>(body)
        .ok()
        .filter(|envelope| !envelope.errors.is_empty())
        .map(|envelope| format!(" - {}", describe(&envelope.errors)))
        .unwrap_or_default();

    match status.as_u16() {
        401 | 403 => Error::provider(
            PROVIDER,
            format!(
                "Authentication failed: Invalid API token or insufficient permissions. Status: {}{}",
                status, details
            ),
        ),
        404 => not_found(),
        409 => Error::provider(
            PROVIDER,
            format!(
                "Conflict: Record is being updated by another process. Status: {}{}",
                status, details
            ),
        ),
        429 => Error::network(format!(
            "Rate limit exceeded. Please retry later. Status: {}",
            status
        )),
        500..=599 => Error::network(format!(
            "Cloudflare server error (transient): {}{}",
            status, details
        )),
        _ => Error::provider(
            PROVIDER,
            format!("{} failed: {}{}", context, status, details),
        ),
    }
}

fn describe(messages: &[ApiMessage]) -> String {
    if messages.is_empty() {
        return "request was not successful".to_string();
    }
    messages
        .iter()
        .map(|m| format!("{} (code {})", m.message, m.code))
        .collect::<Vec<_>>()
        .join("; ")
}

fn record_type(address: IpAddr) -> &'static str {
    match address {
        IpAddr::V4(_) => "A",
        IpAddr::V6(_) => "AAAA",
    }
}

/// Whether a `DDNS_MODE` value selects dry-run
pub fn is_dry_run_mode(mode: &str) -> bool {
    mode.trim().eq_ignore_ascii_case("dry-run")
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// # API Call
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn resolve_zone(&self, credential: &Credential, domain_suffix: &str) -> Result<String> {
        tracing::debug!("Looking up zone ID for domain: {}", domain_suffix);

        let request = self
            .client
            .get(self.url("/zones"))
            .query(&[("name", domain_suffix)]);
        let request = self.authorized(request, credential)?;

        let zones: Vec<IdOnly> = self
            .send(request, "Zone lookup", || {
                Error::not_found(format!("Zone not found: {}", domain_suffix))
            })
            .await?
            .unwrap_or_default();

        let zone = zones
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("Zone not found: {}", domain_suffix)))?;

        tracing::debug!("Found zone ID: {}", zone.id);
        Ok(zone.id)
    }

    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=home.example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn resolve_record(
        &self,
        credential: &Credential,
        zone_id: &str,
        record_name: &str,
    ) -> Result<String> {
        tracing::debug!("Looking up record ID: {}", record_name);

        let request = self
            .client
            .get(self.url(&format!("/zones/{}/dns_records", zone_id)))
            .query(&[("name", record_name)]);
        let request = self.authorized(request, credential)?;

        let records: Vec<IdOnly> = self
            .send(request, "Record lookup", || {
                Error::not_found(format!("DNS record not found: {}", record_name))
            })
            .await?
            .unwrap_or_default();

        let record = records
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("DNS record not found: {}", record_name)))?;

        tracing::debug!("Found record ID: {}", record.id);
        Ok(record.id)
    }

    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records/:record_id
    /// Authorization: Bearer <token>
    /// ```
    async fn read_current_value(
        &self,
        credential: &Credential,
        zone_id: &str,
        record_id: &str,
    ) -> Result<IpAddr> {
        let request = self
            .client
            .get(self.url(&format!("/zones/{}/dns_records/{}", zone_id, record_id)));
        let request = self.authorized(request, credential)?;

        let record: DnsRecord = self
            .send(request, "Record read", || {
                Error::not_found(format!("DNS record not found: {}", record_id))
            })
            .await?
            .ok_or_else(|| Error::provider(PROVIDER, "Record read: response has no result"))?;

        record.content.trim().parse().map_err(|e| {
            Error::provider(
                PROVIDER,
                format!("Invalid IP in response ({}): {}", record.content, e),
            )
        })
    }

    /// # API Call (skipped in dry-run mode)
    ///
    /// ```http
    /// PATCH /zones/:zone_id/dns_records/:record_id
    /// {
    ///   "content": "1.2.3.4",
    ///   "type": "A" or "AAAA",
    ///   "proxied": false,
    ///   "ttl": 1
    /// }
    /// ```
    async fn write_value(
        &self,
        credential: &Credential,
        zone_id: &str,
        record_id: &str,
        address: IpAddr,
        proxied: bool,
    ) -> Result<()> {
        let payload = serde_json::json!({
            "content": address.to_string(),
            "type": record_type(address),
            "proxied": proxied,
            "ttl": AUTO_TTL,
        });
        let url = self.url(&format!("/zones/{}/dns_records/{}", zone_id, record_id));

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PATCH request to {} with payload: {}",
                url,
                payload
            );
            return Ok(());
        }

        let request = self.authorized(self.client.patch(&url), credential)?.json(&payload);
        self.send::<serde_json::Value>(request, "Record update", || {
            Error::not_found(format!("DNS record not found: {}", record_id))
        })
        .await?;

        tracing::info!("DNS record {} updated to {}", record_id, address);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddns_core::FailureKind;
    use httpmock::prelude::*;
    use serde_json::json;

    fn token() -> Credential {
        Credential::new("secret_token_12345")
    }

    fn provider_for(server: &MockServer) -> CloudflareProvider {
        CloudflareProvider::new_live().unwrap().with_base_url(server.base_url())
    }

    #[tokio::test]
    async fn test_resolve_zone() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/zones")
                    .query_param("name", "example.com")
                    .header("authorization", "Bearer secret_token_12345");
                then.status(200).json_body(json!({
                    "success": true,
                    "errors": [],
                    "result": [{"id": "zone-123", "name": "example.com"}]
                }));
            })
            .await;

        let zone_id = provider_for(&server)
            .resolve_zone(&token(), "example.com")
            .await
            .unwrap();

        assert_eq!(zone_id, "zone-123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_result_is_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/zones/zone-123/dns_records");
                then.status(200)
                    .json_body(json!({"success": true, "errors": [], "result": []}));
            })
            .await;

        let err = provider_for(&server)
            .resolve_record(&token(), "zone-123", "home.example.com")
            .await
            .unwrap_err();

        assert_eq!(err.failure_kind(), FailureKind::NotFound);
    }

    #[tokio::test]
    async fn test_read_current_value() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/zones/zone-123/dns_records/rec-456");
                then.status(200).json_body(json!({
                    "success": true,
                    "errors": [],
                    "result": {"id": "rec-456", "type": "A", "content": "203.0.113.7", "proxied": false}
                }));
            })
            .await;

        let address = provider_for(&server)
            .read_current_value(&token(), "zone-123", "rec-456")
            .await
            .unwrap();

        assert_eq!(address, "203.0.113.7".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_write_value_patches_record() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/zones/zone-123/dns_records/rec-456")
                    .header("authorization", "Bearer secret_token_12345");
                then.status(200).json_body(json!({
                    "success": true,
                    "errors": [],
                    "result": {"id": "rec-456", "content": "2001:db8::1"}
                }));
            })
            .await;

        provider_for(&server)
            .write_value(&token(), "zone-123", "rec-456", "2001:db8::1".parse().unwrap(), true)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_dry_run_skips_write() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PATCH).path("/zones/zone-123/dns_records/rec-456");
                then.status(200).json_body(json!({"success": true, "result": {}}));
            })
            .await;

        let provider = CloudflareProvider::new_dry_run()
            .unwrap()
            .with_base_url(server.base_url());
        provider
            .write_value(&token(), "zone-123", "rec-456", "203.0.113.7".parse().unwrap(), false)
            .await
            .unwrap();

        mock.assert_calls_async(0).await;
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_keeps_provider_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PATCH).path("/zones/zone-123/dns_records/rec-456");
                then.status(200).json_body(json!({
                    "success": false,
                    "errors": [{"code": 9005, "message": "Content for A record is invalid"}],
                    "result": null
                }));
            })
            .await;

        let err = provider_for(&server)
            .write_value(&token(), "zone-123", "rec-456", "203.0.113.7".parse().unwrap(), false)
            .await
            .unwrap_err();

        assert_eq!(err.failure_kind(), FailureKind::ProviderRejected);
        assert!(err.to_string().contains("Content for A record is invalid"));
    }

    #[tokio::test]
    async fn test_status_code_mapping() {
        let cases = [
            (401, FailureKind::ProviderRejected),
            (403, FailureKind::ProviderRejected),
            (404, FailureKind::NotFound),
            (409, FailureKind::ProviderRejected),
            (429, FailureKind::TransientNetwork),
            (502, FailureKind::TransientNetwork),
            (400, FailureKind::ProviderRejected),
        ];

        for (status, expected) in cases {
            let server = MockServer::start_async().await;
            server
                .mock_async(|when, then| {
                    when.method(GET).path("/zones/zone-123/dns_records/rec-456");
                    then.status(status).json_body(json!({
                        "success": false,
                        "errors": [{"code": 10000, "message": "Authentication error"}]
                    }));
                })
                .await;

            let err = provider_for(&server)
                .read_current_value(&token(), "zone-123", "rec-456")
                .await
                .unwrap_err();
            assert_eq!(err.failure_kind(), expected, "status {}", status);
            assert!(!err.to_string().contains("secret_token_12345"));
        }
    }

    #[tokio::test]
    async fn test_empty_credential_is_rejected_locally() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/zones");
                then.status(200);
            })
            .await;

        let err = provider_for(&server)
            .resolve_zone(&Credential::default(), "example.com")
            .await
            .unwrap_err();

        assert_eq!(err.failure_kind(), FailureKind::ConfigurationIncomplete);
        mock.assert_calls_async(0).await;
    }

    #[tokio::test]
    async fn test_unreachable_api_is_transient() {
        let provider = CloudflareProvider::new_live()
            .unwrap()
            .with_base_url("http://127.0.0.1:9");

        let err = provider
            .resolve_zone(&token(), "example.com")
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_dry_run_mode_parsing() {
        assert!(is_dry_run_mode("dry-run"));
        assert!(is_dry_run_mode(" DRY-RUN "));
        assert!(!is_dry_run_mode(""));
        assert!(!is_dry_run_mode("live"));
    }

    #[test]
    fn test_debug_does_not_leak_anything_sensitive() {
        let provider = CloudflareProvider::new_dry_run().unwrap();
        let debug_str = format!("{:?}", provider);
        assert!(debug_str.contains("CloudflareProvider"));
        assert!(debug_str.contains("dry_run: true"));
    }

    #[test]
    fn test_provider_name() {
        let provider = CloudflareProvider::new_live().unwrap();
        assert_eq!(provider.provider_name(), "cloudflare");
    }
}
