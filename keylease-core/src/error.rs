//! Error types for key leasing and administration.

use thiserror::Error;

/// Errors returned by the key store, lease manager and admin operations.
#[derive(Debug, Error)]
pub enum LeaseError {
    /// The key is not present in any key class.
    #[error("invalid key")]
    InvalidKey,

    /// The key exists but its expiry has passed.
    #[error("key expired")]
    KeyExpired,

    /// The key is currently leased by another client.
    #[error("key is busy")]
    KeyBusy,

    /// The named key class is not one of the known partitions.
    #[error("invalid key class: {0}")]
    InvalidClass(String),

    /// The key is blank after trimming whitespace.
    #[error("key must not be empty")]
    EmptyKey,

    /// Reading or writing durable storage failed.
    #[error("storage I/O error during {context}: {source}")]
    StorageIo {
        /// The operation that failed.
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Durable storage holds content that cannot be loaded.
    #[error("storage corrupt: {0}")]
    StorageCorrupt(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LeaseError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::StorageIo {
            context: context.into(),
            source,
        }
    }

    /// Returns true for faults on the server side rather than in the request.
    #[must_use]
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Self::StorageIo { .. } | Self::StorageCorrupt(_) | Self::Serialization(_)
        )
    }
}

/// Result type for lease operations.
pub type LeaseResult<T> = Result<T, LeaseError>;
