//! Testing utilities for the Relay workspace
//!
//! Shared fixtures, failing collaborators and a manual-clock harness.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use relay_core::{
    BatchJob, ChangeCoalescer, DownstreamQueue, InMemoryQueue, JobReceipt, ManualClock,
    QueueError, RelayConfig, RelayError, TriggerOutcome,
};
use relay_record::{ChangeRecord, MutationEvent, PendingBatch};
use relay_store::{CasOutcome, KeyValueStore, MemoryStore, StoreError, VersionedValue};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Fixed starting instant for deterministic tests
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn secs(n: i64) -> Duration {
    Duration::seconds(n)
}

pub fn identity(i: usize) -> String {
    format!("user{i}@example.com")
}

/// Mutation changing both tracked fields
pub fn user_change(identity: &str, name: &str, time_zone: &str) -> MutationEvent {
    MutationEvent::new(identity)
        .with_change("name", name)
        .with_change("timezone", time_zone)
}

pub fn name_change(identity: &str, name: &str) -> MutationEvent {
    MutationEvent::new(identity).with_change("name", name)
}

pub fn records(n: usize) -> Vec<ChangeRecord> {
    (0..n)
        .map(|i| ChangeRecord::new(identity(i)).unwrap())
        .collect()
}

pub fn pending_of(n: usize) -> PendingBatch {
    PendingBatch::from_records(records(n))
}

/// In-memory queue that can be switched into failure
#[derive(Debug)]
pub struct FailingQueue {
    inner: InMemoryQueue,
    failing: AtomicBool,
    failed_enqueues: AtomicUsize,
}

impl FailingQueue {
    /// Start out failing every enqueue
    pub fn new() -> Self {
        Self {
            inner: InMemoryQueue::new("failing"),
            failing: AtomicBool::new(true),
            failed_enqueues: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn failed_enqueues(&self) -> usize {
        self.failed_enqueues.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &InMemoryQueue {
        &self.inner
    }
}

impl Default for FailingQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DownstreamQueue for FailingQueue {
    async fn depth(&self) -> Result<usize, QueueError> {
        self.inner.depth().await
    }

    async fn enqueue(
        &self,
        job: BatchJob,
        not_before: DateTime<Utc>,
    ) -> Result<JobReceipt, QueueError> {
        if self.failing.load(Ordering::SeqCst) {
            self.failed_enqueues.fetch_add(1, Ordering::SeqCst);
            return Err(QueueError::unavailable("queue offline"));
        }
        self.inner.enqueue(job, not_before).await
    }
}

/// Store that cannot be reached
#[derive(Debug, Default)]
pub struct UnavailableStore;

#[async_trait]
impl KeyValueStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<VersionedValue>, StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn put(&self, _key: &str, _value: Vec<u8>) -> Result<u64, StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn forget(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn compare_and_swap(
        &self,
        _key: &str,
        _expected: Option<u64>,
        _value: Option<Vec<u8>>,
    ) -> Result<CasOutcome, StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }
}

/// Coalescer over in-memory collaborators and a manual clock at `t0()`
#[derive(Debug)]
pub struct Harness {
    pub kv: Arc<MemoryStore>,
    pub queue: Arc<InMemoryQueue>,
    pub clock: Arc<ManualClock>,
    pub coalescer: ChangeCoalescer,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(&RelayConfig::default())
    }

    pub fn with_config(config: &RelayConfig) -> Self {
        let kv = Arc::new(MemoryStore::new());
        let queue = Arc::new(InMemoryQueue::new("subscribers"));
        let clock = Arc::new(ManualClock::new(t0()));
        let coalescer = ChangeCoalescer::new(config, kv.clone(), queue.clone())
            .unwrap()
            .with_clock(clock.clone());

        Self {
            kv,
            queue,
            clock,
            coalescer,
        }
    }

    /// Seconds elapsed since `t0()`
    pub fn at(&self, offset: i64) {
        self.clock.set(t0() + secs(offset));
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.queue.set_background_depth(depth);
    }

    pub async fn change(&self, identity: &str) -> Result<TriggerOutcome, RelayError> {
        self.coalescer
            .on_mutation(&name_change(identity, "Changed Name"))
            .await
    }

    pub async fn pending_len(&self) -> usize {
        self.coalescer.store().load_pending().await.unwrap().len()
    }

    pub async fn last_dispatch(&self) -> Option<DateTime<Utc>> {
        self.coalescer
            .store()
            .load_last_dispatch_time()
            .await
            .unwrap()
    }

    /// Merge `n` records without evaluating a flush
    pub async fn preload(&self, n: usize) {
        self.coalescer
            .store()
            .merge_and_store(records(n))
            .await
            .unwrap();
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failing_queue_can_recover() {
        let queue = FailingQueue::new();
        let job = BatchJob::new(pending_of(1), t0());

        assert!(queue.enqueue(job.clone(), t0()).await.is_err());
        assert_eq!(queue.failed_enqueues(), 1);

        queue.set_failing(false);
        assert!(queue.enqueue(job, t0()).await.is_ok());
        assert_eq!(queue.depth().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn harness_starts_empty() {
        let harness = Harness::new();
        assert_eq!(harness.pending_len().await, 0);
        assert!(harness.last_dispatch().await.is_none());
        assert!(harness.kv.is_empty());
    }
}
