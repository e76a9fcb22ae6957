// # Session Store
//
// In-memory table of authenticated sessions for the control surface.
//
// Identifiers are 32 bytes from the thread-local CSPRNG, URL-safe base64
// without padding. Collisions are not checked.
//
// An expired session is reported as absent by `get` and purged on the spot;
// `sweep` removes the rest on a timer.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rand::RngCore;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

const SESSION_ID_BYTES: usize = 32;

/// An authenticated session
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub principal: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &"<REDACTED>")
            .field("principal", &self.principal)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Cloneable handle to the shared session table
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for `principal` that lives for `ttl`
    pub fn create(&self, principal: &str, ttl: Duration) -> Session {
        self.create_at(principal, ttl, Utc::now())
    }

    pub fn create_at(&self, principal: &str, ttl: Duration, now: DateTime<Utc>) -> Session {
        let session = Session {
            id: generate_session_id(),
            principal: principal.to_string(),
            created_at: now,
            expires_at: now + ttl,
        };
        self.inner
            .write()
            .insert(session.id.clone(), session.clone());
        tracing::debug!("Created session for {}", principal);
        session
    }

    /// Look up a live session
    pub fn get(&self, id: &str) -> Option<Session> {
        self.get_at(id, Utc::now())
    }

    pub fn get_at(&self, id: &str, now: DateTime<Utc>) -> Option<Session> {
        {
            let guard = self.inner.read();
            match guard.get(id) {
                None => return None,
                Some(session) if !session.is_expired_at(now) => return Some(session.clone()),
                Some(_) => {}
            }
        }

        // Expired: purge, re-checking under the write lock in case the entry
        // was replaced in between.
        let mut guard = self.inner.write();
        if guard.get(id).is_some_and(|session| session.is_expired_at(now)) {
            guard.remove(id);
        }
        None
    }

    /// Remove a session; removing an absent one is not an error
    pub fn delete(&self, id: &str) {
        self.inner.write().remove(id);
    }

    /// Remove every expired session, returning how many were removed
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut guard = self.inner.write();
        let before = guard.len();
        guard.retain(|_, session| !session.is_expired_at(now));
        before - guard.len()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
