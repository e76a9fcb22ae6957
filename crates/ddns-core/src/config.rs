//! Configuration types for the DDNS system
//!
//! [`Inventory`] is the persisted layout: the ordered record list plus the
//! global settings. Every field defaults safely when absent so that files
//! written by older versions keep loading.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::records::{Credential, Record};

/// Default reconciliation cadence in minutes
pub const DEFAULT_UPDATE_INTERVAL_MINUTES: u32 = 5;

/// Largest accepted reconciliation cadence in minutes (one day)
pub const MAX_UPDATE_INTERVAL_MINUTES: u32 = 1440;

/// Default control-surface port
pub const DEFAULT_WEB_PORT: u16 = 8082;

/// Default session lifetime in minutes
pub const DEFAULT_SESSION_TIMEOUT_MINUTES: u32 = 60;

/// Default deadline for a single outbound call, in seconds
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

/// Persisted record set and global settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    /// Managed records, in iteration order
    #[serde(default)]
    pub records: Vec<Record>,

    /// Control-surface settings
    #[serde(default)]
    pub web: WebSettings,

    /// Reconciliation cadence in minutes
    #[serde(default = "default_update_interval")]
    pub update_interval: u32,

    /// Whether the scheduler reconciles automatically
    #[serde(default)]
    pub auto_update: bool,

    /// Credential offered for newly added records
    #[serde(default)]
    pub default_api_token: Credential,

    /// Fields this version does not model, kept so a save does not drop them
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Inventory {
    /// Create an empty inventory with default settings
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            web: WebSettings::default(),
            update_interval: DEFAULT_UPDATE_INTERVAL_MINUTES,
            auto_update: false,
            default_api_token: Credential::default(),
            extra: serde_json::Map::new(),
        }
    }

    /// Parse an inventory from JSON, applying migration defaults
    pub fn from_json(json: &str) -> Result<Self, crate::Error> {
        let mut inventory: Inventory = serde_json::from_str(json)?;
        inventory.normalize();
        inventory.validate()?;
        Ok(inventory)
    }

    /// Replace zero values left by older files with their defaults
    pub fn normalize(&mut self) {
        if self.update_interval == 0 {
            self.update_interval = DEFAULT_UPDATE_INTERVAL_MINUTES;
        }
        if self.web.port == 0 {
            self.web.port = DEFAULT_WEB_PORT;
        }
        if self.web.session_timeout == 0 {
            self.web.session_timeout = DEFAULT_SESSION_TIMEOUT_MINUTES;
        }
    }

    /// Validate the inventory
    pub fn validate(&self) -> Result<(), crate::Error> {
        let mut seen = HashSet::new();
        for record in &self.records {
            if record.name.trim().is_empty() {
                return Err(crate::Error::config("Record with empty name"));
            }
            if !seen.insert(record.name.as_str()) {
                return Err(crate::Error::config(format!(
                    "Duplicate record name: {}",
                    record.name
                )));
            }
        }

        if !(1..=MAX_UPDATE_INTERVAL_MINUTES).contains(&self.update_interval) {
            return Err(crate::Error::config(format!(
                "update_interval must be between 1 and {} minutes. Got: {}",
                MAX_UPDATE_INTERVAL_MINUTES, self.update_interval
            )));
        }

        Ok(())
    }

    /// Reconciliation cadence
    pub fn update_period(&self) -> Duration {
        Duration::from_secs(u64::from(self.update_interval) * 60)
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

/// Control-surface settings
///
/// The password hash and similar fields belong to the presentation layer and
/// pass through `extra` untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSettings {
    /// Listening port
    #[serde(default = "default_web_port")]
    pub port: u16,

    /// Session lifetime in minutes
    #[serde(default = "default_session_timeout")]
    pub session_timeout: u32,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl WebSettings {
    /// Session lifetime
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.session_timeout))
    }
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_WEB_PORT,
            session_timeout: DEFAULT_SESSION_TIMEOUT_MINUTES,
            extra: serde_json::Map::new(),
        }
    }
}

/// Partial edit of the global settings; `None` leaves a field as is
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    /// New cadence in minutes (1..=1440)
    pub update_interval: Option<u32>,
    /// New auto-update flag
    pub auto_update: Option<bool>,
    /// New default credential; an empty credential clears it
    pub default_api_token: Option<Credential>,
}

/// Engine tuning that is not persisted with the record set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deadline applied to every outbound call (seconds)
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl EngineConfig {
    /// Deadline applied to every outbound call
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Set the per-call deadline
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_secs = timeout.as_secs().max(1);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

fn default_update_interval() -> u32 {
    DEFAULT_UPDATE_INTERVAL_MINUTES
}

fn default_web_port() -> u16 {
    DEFAULT_WEB_PORT
}

fn default_session_timeout() -> u32 {
    DEFAULT_SESSION_TIMEOUT_MINUTES
}

fn default_call_timeout_secs() -> u64 {
    DEFAULT_CALL_TIMEOUT_SECS
}
