//! Downstream job queue abstraction
//!
//! This module provides:
//!
//! - [`DownstreamQueue`]: Trait for handing flushed batches to a job backend
//! - [`BatchJob`]: The unit enqueued per flush
//! - [`InMemoryQueue`]: In-process queue for tests and simulation
//!
//! Enqueueing is fire-and-forget: the coalescer never waits for a job to run.

pub mod memory;

pub use memory::{InMemoryQueue, ScheduledJob};

use crate::error::QueueError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_record::PendingBatch;
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Unique job identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Generate new job ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One flushed batch on its way downstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchJob {
    /// Job identifier
    pub id: JobId,
    /// The flushed records, in arrival order
    pub records: PendingBatch,
    /// When the coalescer created the job
    pub created_at: DateTime<Utc>,
}

impl BatchJob {
    /// Create job for a batch
    #[inline]
    #[must_use]
    pub fn new(records: PendingBatch, created_at: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            records,
            created_at,
        }
    }

    /// Number of records carried
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the job carries no records
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consumer payload: `{"batches":{"subscribers":[..records..]}}`
    ///
    /// # Errors
    /// Serialization failure
    pub fn payload_json(&self) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct Payload<'a> {
            batches: Subscribers<'a>,
        }

        #[derive(Serialize)]
        struct Subscribers<'a> {
            subscribers: &'a PendingBatch,
        }

        serde_json::to_string(&Payload {
            batches: Subscribers {
                subscribers: &self.records,
            },
        })
    }
}

/// Acknowledgement of an enqueued job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReceipt {
    /// Enqueued job
    pub job_id: JobId,
    /// Instant the job becomes eligible to run
    pub not_before: DateTime<Utc>,
    /// Records carried
    pub record_count: usize,
}

/// Downstream queue that executes flushed batches
///
/// Implementations may target any durable job backend. Enqueue is assumed
/// at-least-once; `depth` may be eventually consistent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DownstreamQueue: Send + Sync {
    /// Number of jobs currently outstanding
    async fn depth(&self) -> Result<usize, QueueError>;

    /// Enqueue a job that must not run before `not_before`
    async fn enqueue(
        &self,
        job: BatchJob,
        not_before: DateTime<Utc>,
    ) -> Result<JobReceipt, QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_record::{ChangeRecord, TrackedField};

    #[test]
    fn payload_wraps_records_as_subscribers() {
        let record = ChangeRecord::new("test@example.com")
            .unwrap()
            .with_field(TrackedField::Name, "John Doe")
            .with_field(TrackedField::TimeZone, "UTC");
        let job = BatchJob::new(PendingBatch::from_records(vec![record]), Utc::now());

        let payload = job.payload_json().unwrap();
        assert!(payload.contains(r#""batches":{"subscribers":"#));

        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(
            value["batches"]["subscribers"][0],
            serde_json::json!({"email": "test@example.com", "name": "John Doe", "time_zone": "UTC"})
        );
    }

    #[test]
    fn job_ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }
}
