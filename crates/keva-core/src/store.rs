//! In-memory entity store.
//!
//! A concurrent key/value table with per-key atomicity. Operations on
//! different keys never block each other; operations on the same key are
//! serialized by the underlying shard locks.

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use keva_protocol::Entry;
use thiserror::Error;
use tracing::{debug, trace};

/// Store errors.
///
/// Absence is not itself an error for reads; it becomes one only for a
/// single-key delete and for the all-or-nothing batch lookup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Delete of a key that does not exist.
    #[error("cannot delete nonexisting entry: {key}")]
    NotFound {
        /// The key that was absent.
        key: String,
    },

    /// Batch lookup with one or more absent keys. No partial results.
    #[error("missing keys in batch get: {}", keys.join(", "))]
    MissingKeys {
        /// Every key that was absent, in requested order.
        keys: Vec<String>,
    },
}

/// An in-memory, thread-safe key/value table.
///
/// Lifetime equals process lifetime; there is no persistence.
pub struct EntityStore {
    entries: DashMap<String, Entry>,
}

impl EntityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Look up a single entry. No side effects.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Entry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    /// Snapshot of all entries at call time.
    ///
    /// Entries are immutable values, so none is ever observed half-mutated;
    /// ordering is unspecified.
    #[must_use]
    pub fn get_all(&self) -> Vec<Entry> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    /// Batch lookup, all-or-nothing.
    ///
    /// Results come back in requested order.
    ///
    /// # Errors
    ///
    /// Fails as a whole, naming every absent key, if any key is missing.
    pub fn get_many(&self, keys: &[String]) -> Result<Vec<Entry>, StoreError> {
        let mut found = Vec::with_capacity(keys.len());
        let mut missing = Vec::new();

        for key in keys {
            match self.get(key) {
                Some(entry) => found.push(entry),
                None => missing.push(key.clone()),
            }
        }

        if missing.is_empty() {
            Ok(found)
        } else {
            Err(StoreError::MissingKeys { keys: missing })
        }
    }

    /// Atomically insert or replace the entry under a key.
    ///
    /// Returns the resulting entry and whether it was newly created. The
    /// created/replaced decision is made under the key's shard lock, so two
    /// concurrent puts on an absent key cannot both observe "was absent".
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) -> (Entry, bool) {
        let key = key.into();
        let entry = Entry::new(key.clone(), value);

        let created = match self.entries.entry(key) {
            MapEntry::Occupied(mut occupied) => {
                occupied.insert(entry.clone());
                false
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(entry.clone());
                true
            }
        };

        trace!(key = %entry.key, created = created, "Stored entry");
        (entry, created)
    }

    /// Atomically remove and return the entry under a key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the key does not exist.
    pub fn delete(&self, key: &str) -> Result<Entry, StoreError> {
        match self.entries.remove(key) {
            Some((_, entry)) => {
                trace!(key = %key, "Removed entry");
                Ok(entry)
            }
            None => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
        }
    }

    /// Clear the store, returning everything that was present.
    ///
    /// Each removal is atomic per key; entries inserted concurrently with
    /// the clear may survive it.
    pub fn delete_all(&self) -> Vec<Entry> {
        let keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        let removed: Vec<Entry> = keys
            .into_iter()
            .filter_map(|key| self.entries.remove(&key).map(|(_, entry)| entry))
            .collect();

        debug!(removed = removed.len(), "Cleared store");
        removed
    }

    /// Number of entries currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}
