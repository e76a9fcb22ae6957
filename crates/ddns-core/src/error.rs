//! Error types for the DDNS system
//!
//! [`Error`] is what fallible operations return. [`FailureKind`] is the
//! coarser classification carried by reconciliation outcomes, so callers can
//! tell a transient network problem from an incomplete record or a failed
//! bookkeeping save without parsing messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// Public-address service or provider unreachable, timed out, or answered
    /// with a transient status
    #[error("Network error: {0}")]
    Network(String),

    /// Record lacks a credential, zone id or record id
    #[error("Configuration incomplete: {0}")]
    ConfigurationIncomplete(String),

    /// The provider was reached and declined the request
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Message preserved from the provider
        message: String,
    },

    /// Record, zone or session absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// A record with the same name already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Durable save or load of the record set failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Invalid daemon or settings configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a configuration-incomplete error
    pub fn incomplete(msg: impl Into<String>) -> Self {
        Self::ConfigurationIncomplete(msg.into())
    }

    /// Create a provider-rejected error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an "already exists" error
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Classify this error for a reconciliation outcome
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::Network(_) => FailureKind::TransientNetwork,
            Error::ConfigurationIncomplete(_) => FailureKind::ConfigurationIncomplete,
            Error::NotFound(_) => FailureKind::NotFound,
            Error::Persistence(_) | Error::Io(_) | Error::Json(_) => FailureKind::Persistence,
            Error::Provider { .. }
            | Error::AlreadyExists(_)
            | Error::Config(_)
            | Error::InvalidInput(_)
            | Error::Other(_) => FailureKind::ProviderRejected,
        }
    }

    /// Whether a later pass may succeed without any new input
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Failure classes reported on a failed reconciliation outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Retried on the next scheduled pass, never within the same pass
    TransientNetwork,
    /// Never retried automatically; needs a record edit
    ConfigurationIncomplete,
    /// Provider declined the authenticated call
    ProviderRejected,
    /// Record absent; an expected outcome, not an error condition
    NotFound,
    /// Durable save failed; DNS changes already applied stay applied
    Persistence,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_classification() {
        assert_eq!(
            Error::network("timed out").failure_kind(),
            FailureKind::TransientNetwork
        );
        assert_eq!(
            Error::incomplete("missing zone ID").failure_kind(),
            FailureKind::ConfigurationIncomplete
        );
        assert_eq!(
            Error::provider("cloudflare", "Invalid request headers").failure_kind(),
            FailureKind::ProviderRejected
        );
        assert_eq!(
            Error::not_found("home.example.com").failure_kind(),
            FailureKind::NotFound
        );
        assert_eq!(
            Error::persistence("disk full").failure_kind(),
            FailureKind::Persistence
        );
    }

    #[test]
    fn test_only_network_is_transient() {
        assert!(Error::network("reset").is_transient());
        assert!(!Error::incomplete("missing API token").is_transient());
        assert!(!Error::provider("cloudflare", "denied").is_transient());
    }

    #[test]
    fn test_failure_kind_wire_names() {
        let json = serde_json::to_string(&FailureKind::ConfigurationIncomplete).unwrap();
        assert_eq!(json, "\"configuration-incomplete\"");
    }
}
