//! Shared test helpers for key leasing tests.

#![allow(dead_code)]

use keylease_core::{AdminOperations, KeyStore, LeaseManager, SharedKeyStore};
use std::path::Path;

pub const DAY: i64 = 24 * 60 * 60;

/// Current time in epoch seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A manager and admin surface sharing one in-memory store.
pub fn in_memory() -> (LeaseManager, AdminOperations) {
    wire(KeyStore::open_in_memory())
}

/// A manager and admin surface over the key file at `path`.
pub fn on_disk(path: &Path) -> (LeaseManager, AdminOperations) {
    wire(KeyStore::open(path).unwrap())
}

fn wire(store: KeyStore) -> (LeaseManager, AdminOperations) {
    let shared = SharedKeyStore::new(store);
    (LeaseManager::new(shared.clone()), AdminOperations::new(shared))
}

/// Issues a daily key valid for one day from `now`.
pub fn issue_daily(admin: &AdminOperations, key: &str, now: i64) {
    admin.add_key("daily_keys", key, now + DAY, None).unwrap();
}
