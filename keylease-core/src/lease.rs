//! The per-key lease state machine.
//!
//! ```text
//! Available --acquire--> Leased --release--> Available
//! ```
//!
//! `Expired` is not a stored state: it is computed from the record's expiry at
//! check time. An expired key is never marked in use, and a key that expires while
//! leased keeps its lease flag until someone releases it.

use crate::error::{LeaseError, LeaseResult};
use crate::record::{KeyClass, KeyRecord, KeyState};
use crate::store::SharedKeyStore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Successful outcome of a lease operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseOutcome {
    /// The lease was granted.
    Accepted,
    /// The lease was dropped.
    Released,
}

/// A read-only view of one key and its derived state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyView {
    pub key_class: KeyClass,
    pub key: String,
    pub record: KeyRecord,
    pub state: KeyState,
    /// True when a higher-precedence class holds the same key string, making this
    /// entry unreachable through lookups.
    #[serde(default)]
    pub shadowed: bool,
}

/// Grants and releases leases over the shared key store.
#[derive(Debug, Clone)]
pub struct LeaseManager {
    store: SharedKeyStore,
}

impl LeaseManager {
    /// Creates a manager over the given store.
    #[must_use]
    pub fn new(store: SharedKeyStore) -> Self {
        Self { store }
    }

    /// Returns the underlying shared store.
    #[must_use]
    pub fn store(&self) -> &SharedKeyStore {
        &self.store
    }

    /// Leases `key` to the caller.
    ///
    /// Checks run in a fixed order: unknown key, then expiry, then busy. The check and
    /// the write of `in_use` happen under one lock, so of any number of concurrent
    /// callers at most one is accepted.
    ///
    /// # Errors
    ///
    /// [`LeaseError::InvalidKey`], [`LeaseError::KeyExpired`], [`LeaseError::KeyBusy`],
    /// or a storage error if the lease could not be persisted (the lease is then not
    /// granted).
    pub fn acquire(&self, key: &str, now: i64) -> LeaseResult<LeaseOutcome> {
        let key = key.trim();
        self.store.transact(|store| {
            let (class, record) = store.get(key).ok_or(LeaseError::InvalidKey)?;

            if record.is_expired(now) {
                warn!("Rejected expired {} key {} (expired {})", class, key, record.expiry);
                return Err(LeaseError::KeyExpired);
            }
            if record.in_use {
                warn!("Rejected busy {} key {}", class, key);
                return Err(LeaseError::KeyBusy);
            }

            let leased = KeyRecord {
                in_use: true,
                last_used: Some(now),
                ..record.clone()
            };
            store.upsert(class, key, leased)?;
            info!("Lease granted on {} key {}", class, key);
            Ok(LeaseOutcome::Accepted)
        })
    }

    /// Drops the lease on `key`.
    ///
    /// Idempotent, and deliberately unauthenticated: any caller who knows the key
    /// string may release it, whoever acquired it.
    ///
    /// # Errors
    ///
    /// [`LeaseError::InvalidKey`] if the key is unknown, or a storage error.
    pub fn release(&self, key: &str) -> LeaseResult<LeaseOutcome> {
        let key = key.trim();
        self.store.transact(|store| {
            let (class, record) = store.get(key).ok_or(LeaseError::InvalidKey)?;

            let released = KeyRecord {
                in_use: false,
                ..record.clone()
            };
            store.upsert(class, key, released)?;
            info!("Lease released on {} key {}", class, key);
            Ok(LeaseOutcome::Released)
        })
    }

    /// Looks up `key` without changing it.
    pub fn inspect(&self, key: &str, now: i64) -> LeaseResult<KeyView> {
        let key = key.trim();
        self.store.read(|store| {
            let (class, record) = store.get(key).ok_or(LeaseError::InvalidKey)?;
            Ok(KeyView {
                key_class: class,
                key: key.to_string(),
                record: record.clone(),
                state: record.state(now),
                shadowed: false,
            })
        })
    }
}
