//! Pending batch and last-dispatch time
//!
//! Two well-known keys hold all cross-invocation state:
//! - the pending batch: `{"first_seq": n, "records": [...]}`, where
//!   `first_seq` counts every record ever cleared from the key
//! - the last dispatch time (RFC 3339 instant)
//!
//! A bare JSON array of records is still read, numbered from zero.

use crate::error::StoreError;
use crate::kv::{CasOutcome, KeyValueStore};
use chrono::{DateTime, Utc};
use relay_record::{ChangeRecord, PendingBatch};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default bound on compare-and-swap attempts per operation
pub const DEFAULT_MAX_CAS_ATTEMPTS: usize = 64;

#[derive(Serialize)]
struct StoredBatch<'a> {
    first_seq: u64,
    records: &'a [ChangeRecord],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LoadedBatch {
    Sequenced {
        first_seq: u64,
        records: Vec<ChangeRecord>,
    },
    Bare(Vec<ChangeRecord>),
}

impl From<LoadedBatch> for PendingBatch {
    fn from(loaded: LoadedBatch) -> Self {
        match loaded {
            LoadedBatch::Sequenced { first_seq, records } => {
                PendingBatch::from_records(records).starting_at(first_seq)
            }
            LoadedBatch::Bare(records) => PendingBatch::from_records(records),
        }
    }
}

/// Store keys for batch state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchKeys {
    /// Key of the pending batch
    pub pending: String,
    /// Key of the last dispatch time
    pub last_dispatch: String,
}

impl BatchKeys {
    /// Create keys
    #[inline]
    #[must_use]
    pub fn new(pending: impl Into<String>, last_dispatch: impl Into<String>) -> Self {
        Self {
            pending: pending.into(),
            last_dispatch: last_dispatch.into(),
        }
    }
}

impl Default for BatchKeys {
    fn default() -> Self {
        Self::new("user_changes_batch", "last_batch_time")
    }
}

/// Batch state held in a shared store
///
/// All writes go through versioned compare-and-swap, retried up to a bound,
/// so `merge_and_store`, `clear_pending` and `clear_flushed` are atomic with
/// respect to each other. Nothing is cached: every call reads the store.
///
/// Clearing never deletes the key, so record sequence numbers keep counting
/// up and a snapshot always names exactly the records it held.
#[derive(Debug, Clone)]
pub struct BatchStore {
    kv: Arc<dyn KeyValueStore>,
    keys: BatchKeys,
    max_attempts: usize,
}

impl BatchStore {
    /// Create batch store over a shared store
    #[inline]
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>, keys: BatchKeys) -> Self {
        Self {
            kv,
            keys,
            max_attempts: DEFAULT_MAX_CAS_ATTEMPTS,
        }
    }

    /// With a different compare-and-swap attempt bound (at least one)
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Keys in use
    #[inline]
    #[must_use]
    pub fn keys(&self) -> &BatchKeys {
        &self.keys
    }

    /// Load the pending batch, empty when nothing was ever stored
    ///
    /// # Errors
    /// - `StoreError::Unavailable` if the store cannot be read
    /// - `StoreError::Codec` if the stored batch is malformed
    pub async fn load_pending(&self) -> Result<PendingBatch, StoreError> {
        Ok(self.read_pending().await?.0)
    }

    /// Append records to the stored batch and return the merged batch
    ///
    /// A full read-modify-write, committed by compare-and-swap and retried
    /// when another writer got in first.
    ///
    /// # Errors
    /// - `StoreError::Contention` after `max_attempts` lost races
    /// - any read/write failure of the backing store
    pub async fn merge_and_store(
        &self,
        records: Vec<ChangeRecord>,
    ) -> Result<PendingBatch, StoreError> {
        if records.is_empty() {
            return self.load_pending().await;
        }

        for attempt in 1..=self.max_attempts {
            let (mut batch, version) = self.read_pending().await?;
            batch.append(records.iter().cloned());
            let encoded = self.encode_pending(&batch)?;

            match self
                .kv
                .compare_and_swap(&self.keys.pending, version, Some(encoded))
                .await?
            {
                CasOutcome::Applied { .. } => {
                    tracing::trace!(
                        added = records.len(),
                        pending = batch.len(),
                        attempt,
                        "merged records into pending batch"
                    );
                    return Ok(batch);
                }
                CasOutcome::Conflict { actual } => {
                    tracing::debug!(
                        attempt,
                        expected = ?version,
                        ?actual,
                        "pending batch changed during merge; retrying"
                    );
                }
            }
        }

        Err(self.contention(&self.keys.pending))
    }

    /// Load the last dispatch time, if any dispatch ever happened
    ///
    /// # Errors
    /// Store read or decode failure
    pub async fn load_last_dispatch_time(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        match self.kv.get(&self.keys.last_dispatch).await? {
            Some(entry) => Ok(Some(decode(&self.keys.last_dispatch, &entry.value)?)),
            None => Ok(None),
        }
    }

    /// Advance the last dispatch time
    ///
    /// The stored instant only ever moves forward: an earlier `at` leaves it
    /// unchanged. Returns the instant stored afterwards.
    ///
    /// # Errors
    /// Store failure or `StoreError::Contention`
    pub async fn store_last_dispatch_time(
        &self,
        at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StoreError> {
        let key = &self.keys.last_dispatch;

        for _ in 0..self.max_attempts {
            let current = self.kv.get(key).await?;
            let version = current.as_ref().map(|entry| entry.version);

            if let Some(entry) = current {
                let existing: DateTime<Utc> = decode(key, &entry.value)?;
                if existing >= at {
                    if existing > at {
                        tracing::debug!(%existing, requested = %at, "refusing to move last dispatch time backwards");
                    }
                    return Ok(existing);
                }
            }

            let encoded = encode(key, &at)?;
            if self
                .kv
                .compare_and_swap(key, version, Some(encoded))
                .await?
                .is_applied()
            {
                return Ok(at);
            }
        }

        Err(self.contention(key))
    }

    /// Reset the pending batch to empty
    ///
    /// # Errors
    /// Store failure or `StoreError::Contention`
    pub async fn clear_pending(&self) -> Result<(), StoreError> {
        for _ in 0..self.max_attempts {
            let (current, version) = self.read_pending().await?;
            if current.is_empty() {
                return Ok(());
            }

            let emptied = current.since(current.end_seq());
            if self.replace_pending(version, &emptied).await? {
                tracing::debug!(cleared = current.len(), "pending batch cleared");
                return Ok(());
            }
        }

        Err(self.contention(&self.keys.pending))
    }

    /// Remove exactly the flushed records, keeping anything merged since
    ///
    /// `flushed` must be a snapshot previously returned by this store. Records
    /// are matched by sequence number, never by content, so an identical
    /// record merged after the snapshot survives. Records of the snapshot that
    /// another dispatcher already removed are skipped; a snapshot whose
    /// records are all gone leaves the batch as is. Returns the batch that
    /// remains.
    ///
    /// # Errors
    /// Store failure or `StoreError::Contention`
    pub async fn clear_flushed(&self, flushed: &PendingBatch) -> Result<PendingBatch, StoreError> {
        if flushed.is_empty() {
            return self.load_pending().await;
        }

        for _ in 0..self.max_attempts {
            let (current, version) = self.read_pending().await?;

            if flushed.first_seq() > current.first_seq() || flushed.end_seq() > current.end_seq()
            {
                tracing::warn!(
                    flushed_from = flushed.first_seq(),
                    flushed_to = flushed.end_seq(),
                    pending_from = current.first_seq(),
                    pending_to = current.end_seq(),
                    "flushed records are not part of the pending batch; leaving it untouched"
                );
                return Ok(current);
            }

            if flushed.end_seq() <= current.first_seq() {
                tracing::debug!(
                    flushed = flushed.len(),
                    "flushed records already cleared elsewhere"
                );
                return Ok(current);
            }

            let remaining = current.since(flushed.end_seq());
            if self.replace_pending(version, &remaining).await? {
                return Ok(remaining);
            }
        }

        Err(self.contention(&self.keys.pending))
    }

    async fn replace_pending(
        &self,
        version: Option<u64>,
        batch: &PendingBatch,
    ) -> Result<bool, StoreError> {
        let encoded = self.encode_pending(batch)?;
        Ok(self
            .kv
            .compare_and_swap(&self.keys.pending, version, Some(encoded))
            .await?
            .is_applied())
    }

    fn encode_pending(&self, batch: &PendingBatch) -> Result<Vec<u8>, StoreError> {
        encode(
            &self.keys.pending,
            &StoredBatch {
                first_seq: batch.first_seq(),
                records: batch.records(),
            },
        )
    }

    async fn read_pending(&self) -> Result<(PendingBatch, Option<u64>), StoreError> {
        match self.kv.get(&self.keys.pending).await? {
            Some(entry) => {
                let loaded: LoadedBatch = decode(&self.keys.pending, &entry.value)?;
                Ok((loaded.into(), Some(entry.version)))
            }
            None => Ok((PendingBatch::new(), None)),
        }
    }

    fn contention(&self, key: &str) -> StoreError {
        StoreError::Contention {
            key: key.to_string(),
            attempts: self.max_attempts,
        }
    }
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|source| StoreError::Codec {
        key: key.to_string(),
        source,
    })
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|source| StoreError::Codec {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::VersionedValue;
    use crate::memory::MemoryStore;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use relay_record::TrackedField;

    fn record(identity: &str) -> ChangeRecord {
        ChangeRecord::new(identity).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn setup() -> (Arc<MemoryStore>, BatchStore) {
        let kv = Arc::new(MemoryStore::new());
        let store = BatchStore::new(kv.clone(), BatchKeys::default());
        (kv, store)
    }

    #[tokio::test]
    async fn load_pending_fails_open_to_empty() {
        let (_, store) = setup();
        assert!(store.load_pending().await.unwrap().is_empty());
        assert!(store.load_last_dispatch_time().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sequential_merges_keep_every_record_in_order() {
        let (_, store) = setup();

        for i in 0..25 {
            let merged = store
                .merge_and_store(vec![record(&format!("user{i}@example.com"))])
                .await
                .unwrap();
            assert_eq!(merged.len(), i + 1);
        }

        let pending = store.load_pending().await.unwrap();
        let identities: Vec<_> = pending.iter().map(ChangeRecord::identity).collect();
        let expected: Vec<_> = (0..25).map(|i| format!("user{i}@example.com")).collect();
        assert_eq!(identities, expected);
    }

    #[tokio::test]
    async fn merge_persists_record_layout() {
        let (kv, store) = setup();
        let change = record("a@example.com").with_field(TrackedField::Name, "New Name");
        store.merge_and_store(vec![change]).await.unwrap();

        let raw = kv.get("user_changes_batch").await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw.value).unwrap();
        assert_eq!(json["first_seq"], 0);
        assert_eq!(json["records"][0]["name"], "New Name");
        assert_eq!(json["records"][0]["email"], "a@example.com");
    }

    #[tokio::test]
    async fn bare_record_array_is_still_read() {
        let (kv, store) = setup();
        kv.put(
            "user_changes_batch",
            br#"[{"email":"a@x.io"},{"email":"b@x.io","name":"B"}]"#.to_vec(),
        )
        .await
        .unwrap();

        let pending = store.load_pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending.first_seq(), 0);

        let merged = store.merge_and_store(vec![record("c@x.io")]).await.unwrap();
        assert_eq!(merged.end_seq(), 3);
    }

    #[tokio::test]
    async fn stored_record_without_identity_is_a_codec_error() {
        let (kv, store) = setup();
        kv.put(
            "user_changes_batch",
            br#"{"first_seq":0,"records":[{"email":""}]}"#.to_vec(),
        )
        .await
        .unwrap();

        let err = store.load_pending().await.unwrap_err();
        assert!(matches!(err, StoreError::Codec { .. }));
    }

    #[tokio::test]
    async fn clear_pending_empties_batch() {
        let (kv, store) = setup();
        store.merge_and_store(vec![record("a@x.io")]).await.unwrap();

        store.clear_pending().await.unwrap();

        let pending = store.load_pending().await.unwrap();
        assert!(pending.is_empty());
        assert_eq!(pending.first_seq(), 1);
        assert!(kv.contains_key("user_changes_batch"));
    }

    #[tokio::test]
    async fn clear_flushed_keeps_records_merged_after_snapshot() {
        let (_, store) = setup();
        let snapshot = store
            .merge_and_store(vec![record("a@x.io"), record("b@x.io")])
            .await
            .unwrap();
        store.merge_and_store(vec![record("late@x.io")]).await.unwrap();

        let remaining = store.clear_flushed(&snapshot).await.unwrap();

        assert_eq!(remaining.len(), 1);
        let pending = store.load_pending().await.unwrap();
        assert_eq!(pending, remaining);
        assert_eq!(pending.records()[0].identity(), "late@x.io");
    }

    #[tokio::test]
    async fn clear_flushed_keeps_counting_when_nothing_remains() {
        let (_, store) = setup();
        let snapshot = store.merge_and_store(vec![record("a@x.io")]).await.unwrap();

        let remaining = store.clear_flushed(&snapshot).await.unwrap();
        assert!(remaining.is_empty());
        assert_eq!(remaining.first_seq(), 1);

        let merged = store.merge_and_store(vec![record("a@x.io")]).await.unwrap();
        assert_eq!(merged.first_seq(), 1);
    }

    #[tokio::test]
    async fn repeated_clear_of_same_snapshot_keeps_identical_later_record() {
        let (_, store) = setup();
        let snapshot = store.merge_and_store(vec![record("a@x.io")]).await.unwrap();
        store.clear_flushed(&snapshot).await.unwrap();
        store.merge_and_store(vec![record("a@x.io")]).await.unwrap();

        let remaining = store.clear_flushed(&snapshot).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(store.load_pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_flushed_ignores_snapshot_from_another_store() {
        let (_, store) = setup();
        let foreign = PendingBatch::from_records(vec![record("gone@x.io"), record("gone@x.io")]);
        store.merge_and_store(vec![record("fresh@x.io")]).await.unwrap();

        let remaining = store.clear_flushed(&foreign).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(store.load_pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn last_dispatch_time_only_moves_forward() {
        let (_, store) = setup();
        let later = t0() + Duration::seconds(80);

        assert_eq!(store.store_last_dispatch_time(later).await.unwrap(), later);
        assert_eq!(store.store_last_dispatch_time(t0()).await.unwrap(), later);
        assert_eq!(store.load_last_dispatch_time().await.unwrap(), Some(later));

        let even_later = later + Duration::seconds(8);
        store.store_last_dispatch_time(even_later).await.unwrap();
        assert_eq!(
            store.load_last_dispatch_time().await.unwrap(),
            Some(even_later)
        );
    }

    #[tokio::test]
    async fn malformed_pending_value_is_an_error_not_empty() {
        let (kv, store) = setup();
        kv.put("user_changes_batch", b"not json".to_vec()).await.unwrap();

        let err = store.load_pending().await.unwrap_err();
        assert!(matches!(err, StoreError::Codec { .. }));
    }

    #[tokio::test]
    async fn custom_keys_are_respected() {
        let kv = Arc::new(MemoryStore::new());
        let store = BatchStore::new(kv.clone(), BatchKeys::new("pending", "last"));
        store.merge_and_store(vec![record("a@x.io")]).await.unwrap();
        store.store_last_dispatch_time(t0()).await.unwrap();

        assert!(kv.contains_key("pending"));
        assert!(kv.contains_key("last"));
        assert!(!kv.contains_key("user_changes_batch"));
    }

    /// Store whose version moves on every read, so every CAS loses
    #[derive(Debug, Default)]
    struct AlwaysRacing {
        reads: std::sync::atomic::AtomicU64,
    }

    #[async_trait]
    impl KeyValueStore for AlwaysRacing {
        async fn get(&self, _key: &str) -> Result<Option<VersionedValue>, StoreError> {
            let version = self
                .reads
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Some(VersionedValue {
                value: b"[]".to_vec(),
                version,
            }))
        }

        async fn put(&self, _key: &str, _value: Vec<u8>) -> Result<u64, StoreError> {
            Ok(0)
        }

        async fn forget(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn compare_and_swap(
            &self,
            _key: &str,
            _expected: Option<u64>,
            _value: Option<Vec<u8>>,
        ) -> Result<CasOutcome, StoreError> {
            Ok(CasOutcome::Conflict {
                actual: Some(u64::MAX),
            })
        }
    }

    #[tokio::test]
    async fn merge_gives_up_after_bounded_attempts() {
        let store = BatchStore::new(Arc::new(AlwaysRacing::default()), BatchKeys::default())
            .with_max_attempts(3);

        let err = store
            .merge_and_store(vec![record("a@x.io")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Contention { attempts: 3, .. }));
    }
}
