//! Admin sessions: password login issuing short-lived bearer tokens.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};
use uuid::Uuid;

/// Default admin session lifetime (12 hours).
pub const DEFAULT_SESSION_TTL_SECS: i64 = 12 * 60 * 60;

/// Tracks admin sessions issued after a successful password check.
#[derive(Debug)]
pub struct SessionStore {
    password_digest: Option<[u8; 32]>,
    ttl_secs: i64,
    /// Token -> expiry in epoch seconds.
    sessions: Mutex<HashMap<Uuid, i64>>,
}

impl SessionStore {
    /// Creates a store checking logins against `admin_password`.
    ///
    /// Without a password every login is refused.
    #[must_use]
    pub fn new(admin_password: Option<&str>, ttl_secs: i64) -> Self {
        Self {
            password_digest: admin_password.map(digest),
            ttl_secs,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if an admin password is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.password_digest.is_some()
    }

    /// Issues a token if `password` matches.
    pub fn login(&self, password: &str, now: i64) -> Option<Uuid> {
        let Some(expected) = &self.password_digest else {
            warn!("Admin login refused: no admin password configured");
            return None;
        };
        if !constant_time_eq(expected, &digest(password)) {
            warn!("Admin login refused: wrong password");
            return None;
        }

        let token = Uuid::new_v4();
        let mut sessions = self.lock();
        sessions.retain(|_, expires| *expires >= now);
        sessions.insert(token, now.saturating_add(self.ttl_secs));
        info!("Admin session opened");
        Some(token)
    }

    /// Returns true if `token` names a live session.
    pub fn is_valid(&self, token: &Uuid, now: i64) -> bool {
        self.lock()
            .get(token)
            .is_some_and(|expires| *expires >= now)
    }

    /// Ends a session. Returns whether it existed.
    pub fn logout(&self, token: &Uuid) -> bool {
        let removed = self.lock().remove(token).is_some();
        if removed {
            info!("Admin session closed");
        }
        removed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, i64>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn digest(s: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(s.as_bytes()));
    out
}

/// Compares digests without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_requires_configured_password() {
        let store = SessionStore::new(None, 60);
        assert!(!store.is_enabled());
        assert!(store.login("", 0).is_none());
    }

    #[test]
    fn login_and_logout() {
        let store = SessionStore::new(Some("hunter2"), 60);
        assert!(store.login("hunter3", 0).is_none());

        let token = store.login("hunter2", 0).unwrap();
        assert!(store.is_valid(&token, 30));
        assert!(store.logout(&token));
        assert!(!store.is_valid(&token, 30));
        assert!(!store.logout(&token));
    }

    #[test]
    fn sessions_expire() {
        let store = SessionStore::new(Some("pw"), 60);
        let token = store.login("pw", 100).unwrap();
        assert!(store.is_valid(&token, 160));
        assert!(!store.is_valid(&token, 161));
    }

    #[test]
    fn huge_ttl_saturates() {
        let store = SessionStore::new(Some("pw"), i64::MAX);
        let token = store.login("pw", 1_700_000_000).unwrap();
        assert!(store.is_valid(&token, 1_700_000_001));
        assert!(store.is_valid(&token, i64::MAX));
    }

    #[test]
    fn unknown_token_is_invalid() {
        let store = SessionStore::new(Some("pw"), 60);
        assert!(!store.is_valid(&Uuid::new_v4(), 0));
    }
}
