//! License key validation and leasing.
//!
//! Clients present a key; the [`LeaseManager`] validates it against the
//! [`KeyStore`] and leases it to at most one client at a time until released.
//! [`AdminOperations`] issue and revoke keys.
//!
//! # Design
//!
//! - **Single source of truth**: one JSON key file, rewritten atomically on every change
//! - **Write-through**: a mutation is on disk before the call returns success
//! - **One lock**: every check-and-set runs inside [`SharedKeyStore::transact`]
//! - **Derived expiry**: expiry is compared at check time and never stored as a flag
//!
//! # Key File Format
//!
//! ```json
//! {
//!   "daily_keys":   { "ABC123": { "expiry": 1700086400, "in_use": false, "last_used": null, "owner": "alice" } },
//!   "monthly_keys": {}
//! }
//! ```

mod admin;
mod error;
pub mod fs;
mod lease;
mod record;
mod store;

pub use admin::{AddOutcome, AdminOperations};
pub use error::{LeaseError, LeaseResult};
pub use lease::{KeyView, LeaseManager, LeaseOutcome};
pub use record::{KeyClass, KeyRecord, KeyState};
pub use store::{KeyStore, SharedKeyStore};
