//! Access control for the control surface
//!
//! - [`SessionStore`]: authenticated sessions with expiry
//! - [`RateLimiter`]: per-origin failed-login windows with lockout
//! - [`LoginGuard`]: the login flow composed from both
//!
//! The stores are cloneable handles over shared tables. They are owned by
//! whoever builds the control surface and passed to it explicitly.

pub mod rate_limit;
pub mod session;

pub use rate_limit::{LoginAttemptWindow, RateLimitPolicy, RateLimiter};
pub use session::{Session, SessionStore};

use chrono::Duration;
use thiserror::Error;

/// Checks a submitted password
///
/// Hashing is the implementor's concern; the guard only needs a yes or no.
pub trait PasswordVerifier: Send + Sync {
    fn verify(&self, provided: &str) -> bool;
}

impl<F> PasswordVerifier for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn verify(&self, provided: &str) -> bool {
        self(provided)
    }
}

/// Why a login was refused
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginError {
    /// The origin is locked out; the password was not checked
    #[error("Too many failed login attempts. Please try again later.")]
    Blocked,

    #[error("Invalid password")]
    InvalidCredentials,
}

/// Login flow: lockout check, password check, session creation
pub struct LoginGuard {
    limiter: RateLimiter,
    sessions: SessionStore,
    verifier: Box<dyn PasswordVerifier>,
    principal: String,
    session_ttl: Duration,
}

impl LoginGuard {
    pub fn new(
        limiter: RateLimiter,
        sessions: SessionStore,
        verifier: Box<dyn PasswordVerifier>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            limiter,
            sessions,
            verifier,
            principal: "admin".to_string(),
            session_ttl,
        }
    }

    /// Attempt a login from `origin`
    pub fn login(&self, origin: &str, password: &str) -> Result<Session, LoginError> {
        if self.limiter.is_blocked(origin) {
            tracing::warn!("Refused login from locked-out origin {}", origin);
            return Err(LoginError::Blocked);
        }

        if !self.verifier.verify(password) {
            self.limiter.record_failure(origin);
            tracing::info!(
                "Failed login from {} ({} recent failures)",
                origin,
                self.limiter.failure_count(origin)
            );
            return Err(LoginError::InvalidCredentials);
        }

        self.limiter.record_success(origin);
        Ok(self.sessions.create(&self.principal, self.session_ttl))
    }

    /// End a session
    pub fn logout(&self, session_id: &str) {
        self.sessions.delete(session_id);
    }

    /// The live session for an identifier, if any
    pub fn authenticate(&self, session_id: &str) -> Option<Session> {
        self.sessions.get(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn guard_with(limiter: RateLimiter, sessions: SessionStore) -> LoginGuard {
        LoginGuard::new(
            limiter,
            sessions,
            Box::new(|provided: &str| provided == "hunter2"),
            Duration::minutes(60),
        )
    }

    #[test]
    fn test_successful_login_creates_session() {
        let sessions = SessionStore::new();
        let guard = guard_with(RateLimiter::new(), sessions.clone());

        let session = guard.login("198.51.100.4", "hunter2").unwrap();
        assert_eq!(session.principal, "admin");
        assert!(guard.authenticate(&session.id).is_some());

        guard.logout(&session.id);
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_lockout_refuses_before_checking_password() {
        let checks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&checks);
        let limiter = RateLimiter::new();
        let guard = LoginGuard::new(
            limiter.clone(),
            SessionStore::new(),
            Box::new(move |provided: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
                provided == "hunter2"
            }),
            Duration::minutes(60),
        );

        for _ in 0..5 {
            assert_eq!(
                guard.login("198.51.100.4", "wrong"),
                Err(LoginError::InvalidCredentials)
            );
        }
        assert_eq!(checks.load(Ordering::SeqCst), 5);

        assert_eq!(guard.login("198.51.100.4", "hunter2"), Err(LoginError::Blocked));
        assert_eq!(checks.load(Ordering::SeqCst), 5);

        // Other origins are unaffected
        assert!(guard.login("198.51.100.5", "hunter2").is_ok());
        assert!(limiter.is_blocked("198.51.100.4"));
    }

    #[test]
    fn test_success_resets_failures() {
        let limiter = RateLimiter::new();
        let guard = guard_with(limiter.clone(), SessionStore::new());

        guard.login("198.51.100.4", "wrong").unwrap_err();
        guard.login("198.51.100.4", "wrong").unwrap_err();
        assert_eq!(limiter.failure_count("198.51.100.4"), 2);

        guard.login("198.51.100.4", "hunter2").unwrap();
        assert_eq!(limiter.failure_count("198.51.100.4"), 0);
    }
}
