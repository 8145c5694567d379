//! Shared key-value store abstraction
//!
//! The store must be visible to every process running the coalescer, so
//! production implementations sit in front of an external service. Values are
//! opaque bytes; every write bumps a per-key version used for optimistic
//! concurrency.

use crate::error::StoreError;
use async_trait::async_trait;

/// A stored value and the version it was written at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    /// Encoded value
    pub value: Vec<u8>,
    /// Monotonic write version
    pub version: u64,
}

/// Result of a compare-and-swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write was applied; `None` when the key was removed
    Applied {
        /// Version of the new value
        version: Option<u64>,
    },
    /// The key's version did not match the expectation
    Conflict {
        /// Version actually found (`None` when absent)
        actual: Option<u64>,
    },
}

impl CasOutcome {
    /// Returns true if the swap was applied
    #[inline]
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Versioned shared store
///
/// ## CAS Semantics
///
/// `compare_and_swap(key, expected, value)` succeeds only when the key's
/// current version equals `expected` (`None` meaning "absent"). A `None`
/// value removes the key. This is the primitive that keeps concurrent
/// read-modify-write cycles from losing updates.
///
/// No TTL: entries live until forgotten.
#[async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Read a key
    async fn get(&self, key: &str) -> Result<Option<VersionedValue>, StoreError>;

    /// Unconditionally replace a key, returning the new version
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<u64, StoreError>;

    /// Remove a key (no-op when absent)
    async fn forget(&self, key: &str) -> Result<(), StoreError>;

    /// Conditionally replace or remove a key
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<u64>,
        value: Option<Vec<u8>>,
    ) -> Result<CasOutcome, StoreError>;
}
