// # Login Rate Limiter
//
// Per-origin windows of failed login attempts. Reaching the failure
// threshold locks the origin out; a success clears its window.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Failures before an origin is locked out
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

/// Lockout length in minutes
pub const LOCKOUT_MINUTES: i64 = 15;

/// Idle time in minutes after which an unlocked window is forgotten
pub const WINDOW_HORIZON_MINUTES: i64 = 60;

/// Rate limiting thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_failures: u32,
    pub lockout: Duration,
    pub horizon: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_failures: MAX_FAILED_ATTEMPTS,
            lockout: Duration::minutes(LOCKOUT_MINUTES),
            horizon: Duration::minutes(WINDOW_HORIZON_MINUTES),
        }
    }
}

/// Failed attempts from one origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttemptWindow {
    pub count: u32,
    pub last_attempt: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Cloneable handle to the shared attempt table
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    inner: Arc<RwLock<HashMap<String, LoginAttemptWindow>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            inner: Arc::default(),
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Whether `origin` is currently locked out
    pub fn is_blocked(&self, origin: &str) -> bool {
        self.is_blocked_at(origin, Utc::now())
    }

    pub fn is_blocked_at(&self, origin: &str, now: DateTime<Utc>) -> bool {
        self.inner
            .read()
            .get(origin)
            .and_then(|window| window.locked_until)
            .is_some_and(|until| now < until)
    }

    /// Count a failed attempt
    pub fn record_failure(&self, origin: &str) {
        self.record_failure_at(origin, Utc::now());
    }

    pub fn record_failure_at(&self, origin: &str, now: DateTime<Utc>) {
        let mut guard = self.inner.write();
        let window = guard
            .entry(origin.to_string())
            .or_insert_with(|| LoginAttemptWindow {
                count: 0,
                last_attempt: now,
                locked_until: None,
            });

        window.count += 1;
        window.last_attempt = now;

        if window.count >= self.policy.max_failures {
            let until = now + self.policy.lockout;
            window.locked_until = Some(window.locked_until.map_or(until, |existing| existing.max(until)));
            tracing::warn!(
                "Origin {} locked out after {} failed login attempts",
                origin,
                window.count
            );
        }
    }

    /// Clear the origin's window after a successful login
    pub fn record_success(&self, origin: &str) {
        self.inner.write().remove(origin);
    }

    /// Number of failures currently counted for `origin`
    pub fn failure_count(&self, origin: &str) -> u32 {
        self.inner
            .read()
            .get(origin)
            .map_or(0, |window| window.count)
    }

    /// Forget idle windows whose lockout has elapsed, returning how many
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let horizon = now - self.policy.horizon;
        let mut guard = self.inner.write();
        let before = guard.len();
        guard.retain(|_, window| {
            let idle = window.last_attempt < horizon;
            let unlocked = window.locked_until.is_none_or(|until| until <= now);
            !(idle && unlocked)
        });
        before - guard.len()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
