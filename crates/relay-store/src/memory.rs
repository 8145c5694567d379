//! In-memory key-value store
//!
//! Suitable for tests and the simulator only: state is not shared across
//! process boundaries.

use crate::error::StoreError;
use crate::kv::{CasOutcome, KeyValueStore, VersionedValue};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Concurrent in-process store
///
/// Entries live in a `DashMap`; a CAS holds the key's shard lock for the
/// whole compare-then-write, which makes it atomic against every other
/// operation on that key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, VersionedValue>,
    last_version: AtomicU64,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys present
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no keys are present
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a key is present
    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn next_version(&self) -> u64 {
        self.last_version.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<VersionedValue>, StoreError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<u64, StoreError> {
        let version = self.next_version();
        self.entries
            .insert(key.to_string(), VersionedValue { value, version });
        Ok(version)
    }

    async fn forget(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<u64>,
        value: Option<Vec<u8>>,
    ) -> Result<CasOutcome, StoreError> {
        let outcome = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let actual = occupied.get().version;
                if expected != Some(actual) {
                    return Ok(CasOutcome::Conflict {
                        actual: Some(actual),
                    });
                }
                match value {
                    Some(value) => {
                        let version = self.next_version();
                        occupied.insert(VersionedValue { value, version });
                        CasOutcome::Applied {
                            version: Some(version),
                        }
                    }
                    None => {
                        occupied.remove();
                        CasOutcome::Applied { version: None }
                    }
                }
            }
            Entry::Vacant(vacant) => {
                if expected.is_some() {
                    return Ok(CasOutcome::Conflict { actual: None });
                }
                match value {
                    Some(value) => {
                        let version = self.next_version();
                        vacant.insert(VersionedValue { value, version });
                        CasOutcome::Applied {
                            version: Some(version),
                        }
                    }
                    None => CasOutcome::Applied { version: None },
                }
            }
        };
        Ok(outcome)
    }
}
