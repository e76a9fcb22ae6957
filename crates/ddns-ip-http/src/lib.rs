// # HTTP Address Resolver
//
// This crate provides an HTTP-based public address resolver for the DDNS
// system.
//
// ## Architecture
//
// Asks external "what is my IP" services for the host's public address. The
// services are tried in order; the first one that answers with a parseable
// address (of the wanted family, if one is set) wins. Each service gets a
// 10 second timeout. Nothing is cached: every call asks again.

use ddns_core::traits::AddressResolver;
use ddns_core::{Error, Result};

use std::net::IpAddr;
use std::time::Duration;

/// Default public address services, tried in this order
pub const DEFAULT_IP_SERVICES: &[&str] = &[
    "https://api.ipify.org",  // returns plain text IP
    "https://ifconfig.me/ip", // No rate limit documented
    "https://icanhazip.com",  // No rate limit documented
];

/// Per-service timeout
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Address family filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    fn accepts(self, ip: &IpAddr) -> bool {
        match self {
            IpFamily::V4 => ip.is_ipv4(),
            IpFamily::V6 => ip.is_ipv6(),
        }
    }
}

/// HTTP-based public address resolver
#[derive(Debug, Clone)]
pub struct HttpAddressResolver {
    /// Services to ask, in order
    services: Vec<String>,

    /// Only accept addresses of this family
    family: Option<IpFamily>,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpAddressResolver {
    /// Create a resolver over the given services
    pub fn new<I, S>(services: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let services: Vec<String> = services
            .into_iter()
            .map(Into::into)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();
        if services.is_empty() {
            return Err(Error::config("at least one address service URL is required"));
        }

        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            services,
            family: None,
            client,
        })
    }

    /// Create a resolver over [`DEFAULT_IP_SERVICES`]
    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_IP_SERVICES.iter().copied())
    }

    /// Only accept addresses of `family`
    pub fn with_family(mut self, family: IpFamily) -> Self {
        self.family = Some(family);
        self
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Ask one service
    async fn fetch_ip(&self, url: &str) -> Result<IpAddr> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::network(format!("Request to {} failed: {}", url, e.without_url())))?;

        if !response.status().is_success() {
            return Err(Error::network(format!(
                "{} answered HTTP {}",
                url,
                response.status()
            )));
        }

        let ip_text = response
            .text()
            .await
            .map_err(|e| Error::network(format!("Failed to read response from {}: {}", url, e)))?;
        let ip_text = ip_text.trim();

        let ip: IpAddr = ip_text
            .parse()
            .map_err(|_| Error::network(format!("Invalid IP address from {}: {}", url, ip_text)))?;

        if let Some(family) = self.family {
            if !family.accepts(&ip) {
                return Err(Error::network(format!(
                    "Expected {:?} address from {}, got: {}",
                    family, url, ip
                )));
            }
        }

        Ok(ip)
    }
}

#[async_trait::async_trait]
impl AddressResolver for HttpAddressResolver {
    async fn current(&self) -> Result<IpAddr> {
        let mut failures = Vec::new();

        for url in &self.services {
            match self.fetch_ip(url).await {
                Ok(ip) => {
                    tracing::debug!("Public address {} from {}", ip, url);
                    return Ok(ip);
                }
                Err(e) => {
                    tracing::warn!("Address service failed: {}", e);
                    failures.push(e.to_string());
                }
            }
        }

        Err(Error::network(format!(
            "all address services failed: {}",
            failures.join("; ")
        )))
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_first_service_answers() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/ip");
                then.status(200).body("203.0.113.7\n");
            })
            .await;

        let resolver = HttpAddressResolver::new([server.url("/ip")]).unwrap();
        let ip = resolver.current().await.unwrap();

        assert_eq!(ip, "203.0.113.7".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_falls_over_to_next_service() {
        let server = MockServer::start_async().await;
        let broken = server
            .mock_async(|when, then| {
                when.method(GET).path("/broken");
                then.status(503);
            })
            .await;
        let garbage = server
            .mock_async(|when, then| {
                when.method(GET).path("/garbage");
                then.status(200).body("<html>not an address</html>");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/good");
                then.status(200).body("2001:db8::7");
            })
            .await;

        let resolver = HttpAddressResolver::new([
            server.url("/broken"),
            server.url("/garbage"),
            server.url("/good"),
        ])
        .unwrap();

        let ip = resolver.current().await.unwrap();
        assert_eq!(ip, "2001:db8::7".parse::<IpAddr>().unwrap());
        broken.assert_calls_async(1).await;
        garbage.assert_calls_async(1).await;
    }

    #[tokio::test]
    async fn test_family_filter_skips_wrong_family() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v6");
                then.status(200).body("2001:db8::7");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v4");
                then.status(200).body("203.0.113.7");
            })
            .await;

        let resolver = HttpAddressResolver::new([server.url("/v6"), server.url("/v4")])
            .unwrap()
            .with_family(IpFamily::V4);

        assert_eq!(
            resolver.current().await.unwrap(),
            "203.0.113.7".parse::<IpAddr>().unwrap()
        );
    }

    #[tokio::test]
    async fn test_all_services_failing_is_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/down");
                then.status(500);
            })
            .await;

        let resolver = HttpAddressResolver::new([server.url("/down")]).unwrap();
        let err = resolver.current().await.unwrap_err();

        assert!(err.is_transient());
        assert!(err.to_string().contains("all address services failed"));
    }

    #[test]
    fn test_requires_a_service() {
        assert!(HttpAddressResolver::new(Vec::<String>::new()).is_err());
        assert!(HttpAddressResolver::new(["  "]).is_err());
        assert_eq!(HttpAddressResolver::with_defaults().unwrap().services().len(), 3);
    }
}
