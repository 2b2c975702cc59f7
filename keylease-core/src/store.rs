//! Durable key store backed by a single JSON file.
//!
//! The file holds one object per key class (`daily_keys`, `monthly_keys`), each
//! mapping key strings to [`KeyRecord`]s. Every mutation is written through to disk
//! before it returns; a failed write restores the previous in-memory value.

use crate::error::{LeaseError, LeaseResult};
use crate::fs::{atomic_write, bounded_read, DEFAULT_MAX_FILE_SIZE};
use crate::record::{KeyClass, KeyRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info};

/// On-disk layout of the key file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct KeyFile {
    #[serde(default)]
    daily_keys: BTreeMap<String, KeyRecord>,
    #[serde(default)]
    monthly_keys: BTreeMap<String, KeyRecord>,
    /// Top-level entries other than the two class partitions, written back untouched.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl KeyFile {
    fn partition(&self, class: KeyClass) -> &BTreeMap<String, KeyRecord> {
        match class {
            KeyClass::Daily => &self.daily_keys,
            KeyClass::Monthly => &self.monthly_keys,
        }
    }

    fn partition_mut(&mut self, class: KeyClass) -> &mut BTreeMap<String, KeyRecord> {
        match class {
            KeyClass::Daily => &mut self.daily_keys,
            KeyClass::Monthly => &mut self.monthly_keys,
        }
    }
}

/// The in-memory key table plus the file it is mirrored to.
#[derive(Debug)]
pub struct KeyStore {
    keys: KeyFile,
    path: Option<PathBuf>,
}

impl KeyStore {
    /// Loads the store from `path`, or starts empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::StorageCorrupt`] if the file cannot be parsed and
    /// [`LeaseError::StorageIo`] if it cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> LeaseResult<Self> {
        Self::open_with_limit(path, DEFAULT_MAX_FILE_SIZE)
    }

    /// Like [`KeyStore::open`], refusing files larger than `max_bytes`.
    pub fn open_with_limit(path: impl Into<PathBuf>, max_bytes: u64) -> LeaseResult<Self> {
        let path = path.into();
        let keys = match bounded_read(&path, max_bytes)? {
            Some(bytes) => serde_json::from_slice::<KeyFile>(&bytes).map_err(|e| {
                LeaseError::StorageCorrupt(format!("{}: {e}", path.display()))
            })?,
            None => {
                info!("No key file at {:?}, starting with an empty store", path);
                KeyFile::default()
            }
        };

        info!(
            "Loaded {} daily and {} monthly keys from {:?}",
            keys.daily_keys.len(),
            keys.monthly_keys.len(),
            path
        );
        Ok(Self {
            keys,
            path: Some(path),
        })
    }

    /// Opens a store that is never written to disk (for testing).
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self {
            keys: KeyFile::default(),
            path: None,
        }
    }

    /// Returns the backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Looks a key up in each class in precedence order; the first class holding it wins.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<(KeyClass, &KeyRecord)> {
        let found = KeyClass::ALL
            .into_iter()
            .find_map(|class| self.keys.partition(class).get(key).map(|r| (class, r)));
        debug!("Lookup of {} resolved to {:?}", key, found.map(|(c, _)| c));
        found
    }

    /// Looks a key up in one class only.
    #[must_use]
    pub fn get_in(&self, class: KeyClass, key: &str) -> Option<&KeyRecord> {
        self.keys.partition(class).get(key)
    }

    /// Inserts or replaces a record and persists. Returns the replaced record.
    ///
    /// If persisting fails the previous record (or its absence) is restored.
    pub fn upsert(
        &mut self,
        class: KeyClass,
        key: &str,
        record: KeyRecord,
    ) -> LeaseResult<Option<KeyRecord>> {
        let previous = self
            .keys
            .partition_mut(class)
            .insert(key.to_string(), record);

        if let Err(e) = self.persist() {
            let partition = self.keys.partition_mut(class);
            match previous {
                Some(prev) => {
                    partition.insert(key.to_string(), prev);
                }
                None => {
                    partition.remove(key);
                }
            }
            return Err(e);
        }
        Ok(previous)
    }

    /// Removes a record and persists. Returns whether anything was removed.
    ///
    /// Nothing is written when the key was absent. A failed write restores the record.
    pub fn delete(&mut self, class: KeyClass, key: &str) -> LeaseResult<bool> {
        let Some(removed) = self.keys.partition_mut(class).remove(key) else {
            return Ok(false);
        };

        if let Err(e) = self.persist() {
            self.keys
                .partition_mut(class)
                .insert(key.to_string(), removed);
            return Err(e);
        }
        Ok(true)
    }

    /// Writes the full store to its backing file atomically.
    pub fn persist(&self) -> LeaseResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(&self.keys)?;
        atomic_write(path, &json).inspect_err(|e| {
            error!("Failed to persist key store to {:?}: {}", path, e);
        })
    }

    /// Iterates all records, class by class in precedence order, keys sorted.
    pub fn entries(&self) -> impl Iterator<Item = (KeyClass, &str, &KeyRecord)> + '_ {
        KeyClass::ALL.into_iter().flat_map(move |class| {
            self.keys
                .partition(class)
                .iter()
                .map(move |(key, record)| (class, key.as_str(), record))
        })
    }

    /// Total number of records across both classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.daily_keys.len() + self.keys.monthly_keys.len()
    }

    /// Returns true if neither class holds any record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A [`KeyStore`] shared between request handlers.
///
/// All reads and mutations go through the one lock, so a check followed by a write
/// inside [`SharedKeyStore::transact`] cannot interleave with any other operation.
#[derive(Debug, Clone)]
pub struct SharedKeyStore {
    inner: Arc<Mutex<KeyStore>>,
}

impl SharedKeyStore {
    /// Wraps a store for shared use.
    #[must_use]
    pub fn new(store: KeyStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Runs `f` with exclusive access to the store.
    ///
    /// A poisoned lock is recovered: store mutations restore their prior state on
    /// failure, so a panicking holder cannot leave a half-applied change behind.
    pub fn transact<R>(&self, f: impl FnOnce(&mut KeyStore) -> LeaseResult<R>) -> LeaseResult<R> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Runs a read-only `f` under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&KeyStore) -> R) -> R {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}

impl From<KeyStore> for SharedKeyStore {
    fn from(store: KeyStore) -> Self {
        Self::new(store)
    }
}
