// # Records
//
// A record is one managed name-to-address mapping. Its zone and remote
// record identifiers are resolved once, when the record is registered, and
// are what the provider's read and write calls address.
//
// The persisted field names match the record-set file written by earlier
// releases (`record_name`, `api_token`, `last_ip` ...). Empty strings in the
// optional fields read as absent.

mod set;

pub use set::RecordSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Provider credential (API token)
///
/// The Debug implementation intentionally does NOT expose the value.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap a credential, trimming surrounding whitespace
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    /// The raw value, for building provider requests only
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether no credential is set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Credential(<empty>)")
        } else {
            f.write_str("Credential(<REDACTED>)")
        }
    }
}

/// A managed DNS record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Fully qualified record name, unique within the record set
    #[serde(rename = "record_name")]
    pub name: String,

    /// Provider credential
    #[serde(default)]
    pub api_token: Credential,

    /// Whether the provider proxies traffic for this record
    #[serde(default)]
    pub proxied: bool,

    /// Provider zone identifier (empty while unresolved)
    #[serde(default)]
    pub zone_id: String,

    /// Provider record identifier (empty while unresolved)
    #[serde(default)]
    pub record_id: String,

    /// Whether scheduled and bulk passes include this record
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// When an update was last applied
    #[serde(default, deserialize_with = "empty_as_none")]
    pub last_updated: Option<DateTime<Utc>>,

    /// Last address this system applied; advisory only
    #[serde(default, deserialize_with = "empty_as_none")]
    pub last_ip: Option<IpAddr>,

    /// Free-form note
    #[serde(default)]
    pub notes: String,
}

impl Record {
    /// Create an enabled, unresolved record
    pub fn new(name: impl Into<String>, api_token: Credential) -> Self {
        Self {
            name: name.into().trim().to_string(),
            api_token,
            proxied: false,
            zone_id: String::new(),
            record_id: String::new(),
            enabled: true,
            created_at: None,
            last_updated: None,
            last_ip: None,
            notes: String::new(),
        }
    }

    /// Set the resolved provider identifiers
    pub fn with_target(mut self, zone_id: impl Into<String>, record_id: impl Into<String>) -> Self {
        self.zone_id = zone_id.into();
        self.record_id = record_id.into();
        self
    }

    /// Set the proxy flag
    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }

    /// Enable or disable the record
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the note
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Whether both provider identifiers are populated
    pub fn is_resolved(&self) -> bool {
        !self.zone_id.is_empty() && !self.record_id.is_empty()
    }

    /// Check that the record carries everything a provider write needs
    ///
    /// Checked in order: zone id, record id, credential. The first missing
    /// field is named in the error.
    pub fn check_write_coordinates(&self) -> Result<()> {
        if self.zone_id.is_empty() {
            return Err(Error::incomplete(
                "missing zone ID - record configuration incomplete",
            ));
        }
        if self.record_id.is_empty() {
            return Err(Error::incomplete(
                "missing record ID - record configuration incomplete",
            ));
        }
        if self.api_token.is_empty() {
            return Err(Error::incomplete(
                "missing API token - record configuration incomplete",
            ));
        }
        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}

/// Partial edit of a record; `None` leaves a field as is
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub proxied: Option<bool>,
    pub notes: Option<String>,
    pub enabled: Option<bool>,
}

/// Zone name a record lives in: its last two labels
///
/// `home.example.com` -> `example.com`. Multi-label public suffixes such as
/// `co.uk` are not special-cased; a record under one needs an explicit zone.
pub fn zone_suffix(record_name: &str) -> Result<String> {
    let name = record_name.trim().trim_end_matches('.');
    let labels: Vec<&str> = name.split('.').collect();

    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(Error::invalid_input(format!(
            "invalid record name: {}",
            record_name
        )));
    }

    Ok(labels[labels.len() - 2..].join("."))
}

/// Read an optional field that older files stored as an empty string
fn empty_as_none<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
