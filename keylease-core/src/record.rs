//! Key records and the two key classes they are partitioned into.

use crate::error::LeaseError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The partition a key belongs to.
///
/// Classes carry no behavioral difference beyond grouping, but the class is part of
/// a key's identity and the declaration order is the lookup precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyClass {
    /// Keys sold for a day of use.
    Daily,
    /// Keys sold for a month of use.
    Monthly,
}

impl KeyClass {
    /// All classes in lookup precedence order.
    pub const ALL: [KeyClass; 2] = [KeyClass::Daily, KeyClass::Monthly];

    /// Name of the partition in the storage file.
    #[must_use]
    pub fn storage_name(&self) -> &'static str {
        match self {
            Self::Daily => "daily_keys",
            Self::Monthly => "monthly_keys",
        }
    }

    /// Short display name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for KeyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyClass {
    type Err = LeaseError;

    /// Accepts either the storage name (`daily_keys`) or the short name (`daily`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        KeyClass::ALL
            .into_iter()
            .find(|class| normalized == class.storage_name() || normalized == class.as_str())
            .ok_or_else(|| LeaseError::InvalidClass(s.to_string()))
    }
}

/// Lease state of a key at a point in time.
///
/// Derived from the stored record on every read; expiry is never written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyState {
    /// Unexpired and not leased.
    Available,
    /// Unexpired and held by a client.
    Leased,
    /// Past its expiry, whatever the lease flag says.
    Expired,
}

/// One issued key, as stored under its class partition.
///
/// Field names are the on-disk format shared with existing key files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Expiry in seconds since the Unix epoch.
    #[serde(default, deserialize_with = "de_secs")]
    pub expiry: i64,
    /// Whether a client currently holds the lease.
    #[serde(default)]
    pub in_use: bool,
    /// Time of the most recent successful acquisition.
    #[serde(default, deserialize_with = "de_opt_secs")]
    pub last_used: Option<i64>,
    /// Free-text administrative annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Fields this service does not interpret, kept so they survive a rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl KeyRecord {
    /// Creates a fresh, never-used record.
    #[must_use]
    pub fn new(expiry: i64, owner: Option<String>) -> Self {
        Self {
            expiry,
            in_use: false,
            last_used: None,
            owner,
            extra: Map::new(),
        }
    }

    /// Returns true once `now` is strictly past the expiry.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expiry
    }

    /// Computes the lease state at `now`. Expiry takes precedence over the lease flag.
    #[must_use]
    pub fn state(&self, now: i64) -> KeyState {
        if self.is_expired(now) {
            KeyState::Expired
        } else if self.in_use {
            KeyState::Leased
        } else {
            KeyState::Available
        }
    }
}

/// Epoch seconds as written by older clocks, which may be fractional.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSecs {
    Int(i64),
    Float(f64),
}

impl RawSecs {
    fn into_secs(self) -> i64 {
        match self {
            Self::Int(secs) => secs,
            // `as` saturates on out-of-range floats and maps NaN to 0.
            Self::Float(secs) => secs.floor() as i64,
        }
    }
}

fn de_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    RawSecs::deserialize(deserializer).map(RawSecs::into_secs)
}

fn de_opt_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(Option::<RawSecs>::deserialize(deserializer)?.map(RawSecs::into_secs))
}
