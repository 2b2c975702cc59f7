//! Issuing, revoking and listing keys.

use crate::error::{LeaseError, LeaseResult};
use crate::lease::KeyView;
use crate::record::{KeyClass, KeyRecord};
use crate::store::SharedKeyStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

/// Whether [`AdminOperations::add_key`] created a key or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddOutcome {
    Created,
    Replaced,
}

/// Administrative access to the shared key store.
#[derive(Debug, Clone)]
pub struct AdminOperations {
    store: SharedKeyStore,
}

impl AdminOperations {
    #[must_use]
    pub fn new(store: SharedKeyStore) -> Self {
        Self { store }
    }

    /// Issues `key` in `key_class`, replacing any record already stored there.
    ///
    /// The new record is not in use and has never been used. The same key string may
    /// still exist in the other class; that is logged but allowed, and lookups keep
    /// resolving to the higher-precedence class.
    ///
    /// # Errors
    ///
    /// [`LeaseError::InvalidClass`] for an unknown class name, [`LeaseError::EmptyKey`]
    /// for a blank key, or a storage error.
    pub fn add_key(
        &self,
        key_class: &str,
        key: &str,
        expiry: i64,
        owner: Option<String>,
    ) -> LeaseResult<AddOutcome> {
        let class: KeyClass = key_class.parse()?;
        let key = key.trim();
        if key.is_empty() {
            return Err(LeaseError::EmptyKey);
        }
        let owner = owner.filter(|o| !o.trim().is_empty());

        self.store.transact(|store| {
            for other in KeyClass::ALL.into_iter().filter(|c| *c != class) {
                if store.get_in(other, key).is_some() {
                    warn!("Key {} issued as {} but already exists as {}", key, class, other);
                }
            }

            let replaced = store.upsert(class, key, KeyRecord::new(expiry, owner))?;
            info!("Issued {} key {} (expires {})", class, key, expiry);
            Ok(if replaced.is_some() {
                AddOutcome::Replaced
            } else {
                AddOutcome::Created
            })
        })
    }

    /// Revokes `key` from `key_class`. Returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// [`LeaseError::InvalidClass`] for an unknown class name, or a storage error.
    pub fn delete_key(&self, key_class: &str, key: &str) -> LeaseResult<bool> {
        let class: KeyClass = key_class.parse()?;
        let key = key.trim();
        let removed = self.store.transact(|store| store.delete(class, key))?;
        if removed {
            info!("Revoked {} key {}", class, key);
        }
        Ok(removed)
    }

    /// Lists every key, class by class, with its state at `now`.
    #[must_use]
    pub fn list_keys(&self, now: i64) -> Vec<KeyView> {
        self.store.read(|store| {
            let mut seen = HashSet::new();
            store
                .entries()
                .map(|(class, key, record)| KeyView {
                    key_class: class,
                    key: key.to_string(),
                    record: record.clone(),
                    state: record.state(now),
                    shadowed: !seen.insert(key.to_string()),
                })
                .collect()
        })
    }
}
