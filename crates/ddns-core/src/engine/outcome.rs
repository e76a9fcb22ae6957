//! Reconciliation outcomes
//!
//! Every reconciliation attempt produces exactly one [`ReconciliationOutcome`].
//! Failures are data here, not `Err` values: a bulk pass reports one outcome
//! per record no matter how many of them failed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;

use crate::error::{Error, FailureKind};

/// What happened to a record during one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
    /// The provider now serves the desired address
    Updated,
    /// The provider already served the desired address; nothing written
    Unchanged,
    /// The record is disabled; nothing was contacted
    SkippedDisabled,
    /// See the failure kind and detail
    Failed,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OutcomeKind::Updated => "updated",
            OutcomeKind::Unchanged => "unchanged",
            OutcomeKind::SkippedDisabled => "skipped-disabled",
            OutcomeKind::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// What an outcome is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "type", content = "name")]
pub enum OutcomeTarget {
    /// A single record, by name
    Record(String),
    /// The record set as a whole (persistence)
    RecordSet,
}

impl fmt::Display for OutcomeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeTarget::Record(name) => f.write_str(name),
            OutcomeTarget::RecordSet => f.write_str("<record set>"),
        }
    }
}

/// Structured result of one reconciliation attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationOutcome {
    pub target: OutcomeTarget,
    pub kind: OutcomeKind,
    /// Set exactly when `kind` is `Failed`
    pub failure: Option<FailureKind>,
    /// Address the record should point at, when it was determined
    pub desired: Option<IpAddr>,
    /// Address the provider served before the attempt, when known
    pub previous: Option<IpAddr>,
    /// Human-readable explanation
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl ReconciliationOutcome {
    fn new(target: OutcomeTarget, kind: OutcomeKind, detail: impl Into<String>) -> Self {
        Self {
            target,
            kind,
            failure: None,
            desired: None,
            previous: None,
            detail: detail.into(),
            at: Utc::now(),
        }
    }

    pub(crate) fn updated(name: &str, desired: IpAddr, previous: Option<IpAddr>) -> Self {
        let detail = match previous {
            Some(previous) => format!("updated from {} to {}", previous, desired),
            None => format!("updated to {}", desired),
        };
        Self {
            desired: Some(desired),
            previous,
            ..Self::new(OutcomeTarget::Record(name.to_string()), OutcomeKind::Updated, detail)
        }
    }

    pub(crate) fn unchanged(name: &str, current: IpAddr) -> Self {
        Self {
            desired: Some(current),
            previous: Some(current),
            ..Self::new(
                OutcomeTarget::Record(name.to_string()),
                OutcomeKind::Unchanged,
                format!("already points to {}", current),
            )
        }
    }

    pub(crate) fn skipped_disabled(name: &str) -> Self {
        Self::new(
            OutcomeTarget::Record(name.to_string()),
            OutcomeKind::SkippedDisabled,
            "record is disabled",
        )
    }

    pub(crate) fn failed(
        target: OutcomeTarget,
        failure: FailureKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            failure: Some(failure),
            ..Self::new(target, OutcomeKind::Failed, detail)
        }
    }

    pub(crate) fn from_error(name: &str, error: &Error) -> Self {
        Self::failed(
            OutcomeTarget::Record(name.to_string()),
            error.failure_kind(),
            error.to_string(),
        )
    }

    /// Attach the addresses known at the time of failure
    pub(crate) fn with_addresses(mut self, desired: Option<IpAddr>, previous: Option<IpAddr>) -> Self {
        self.desired = desired;
        self.previous = previous;
        self
    }

    /// Record name, if the outcome is about a single record
    pub fn record_name(&self) -> Option<&str> {
        match &self.target {
            OutcomeTarget::Record(name) => Some(name),
            OutcomeTarget::RecordSet => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.kind == OutcomeKind::Failed
    }
}

impl fmt::Display for ReconciliationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.kind)?;
        if let Some(failure) = self.failure {
            write!(f, " ({:?})", failure)?;
        }
        write!(f, " - {}", self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_set_only_on_failed() {
        let ip: IpAddr = "2.2.2.2".parse().unwrap();

        assert!(ReconciliationOutcome::updated("a.example.com", ip, None).failure.is_none());
        assert!(ReconciliationOutcome::unchanged("a.example.com", ip).failure.is_none());
        assert!(ReconciliationOutcome::skipped_disabled("a.example.com").failure.is_none());

        let failed = ReconciliationOutcome::from_error("a.example.com", &Error::network("reset"));
        assert_eq!(failed.kind, OutcomeKind::Failed);
        assert_eq!(failed.failure, Some(FailureKind::TransientNetwork));
    }

    #[test]
    fn test_outcome_serializes_with_wire_names() {
        let outcome = ReconciliationOutcome::skipped_disabled("a.example.com");
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["kind"], "skipped-disabled");
        assert_eq!(json["target"]["type"], "record");
        assert_eq!(json["target"]["name"], "a.example.com");
    }

    #[test]
    fn test_display_names_target() {
        let outcome = ReconciliationOutcome::failed(
            OutcomeTarget::RecordSet,
            FailureKind::Persistence,
            "disk full",
        );
        assert_eq!(outcome.record_name(), None);
        assert!(outcome.to_string().starts_with("<record set>: failed"));
    }
}
