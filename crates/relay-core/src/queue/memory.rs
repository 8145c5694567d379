//! In-memory downstream queue
//!
//! ## Limitations
//!
//! - **Single-process only**: jobs are not visible across process boundaries
//! - **No execution**: consumers pull due jobs with [`InMemoryQueue::take_due`]

use super::{BatchJob, DownstreamQueue, JobReceipt};
use crate::error::QueueError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A job waiting for its scheduled instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    /// The job
    pub job: BatchJob,
    /// Earliest execution instant
    pub not_before: DateTime<Utc>,
}

/// In-process downstream queue
///
/// Depth counts the jobs held here plus a configurable amount of unrelated
/// background work, standing in for other job types sharing the backend.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    name: String,
    jobs: Mutex<Vec<ScheduledJob>>,
    background_depth: AtomicUsize,
}

impl InMemoryQueue {
    /// Create empty queue
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// With outstanding background jobs counted in `depth`
    #[must_use]
    pub fn with_background_depth(self, depth: usize) -> Self {
        self.set_background_depth(depth);
        self
    }

    /// Change the outstanding background job count
    pub fn set_background_depth(&self, depth: usize) {
        self.background_depth.store(depth, Ordering::SeqCst);
    }

    /// Queue name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of batch jobs held
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Whether no batch jobs are held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Snapshot of held jobs in enqueue order
    #[must_use]
    pub fn jobs(&self) -> Vec<ScheduledJob> {
        self.jobs.lock().clone()
    }

    /// Remove and return jobs eligible at `now`, earliest first
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<ScheduledJob> {
        let mut jobs = self.jobs.lock();
        let (mut due, waiting): (Vec<_>, Vec<_>) =
            jobs.drain(..).partition(|job| job.not_before <= now);
        *jobs = waiting;
        drop(jobs);

        due.sort_by_key(|job| job.not_before);
        due
    }

    /// Remove and return every held job
    pub fn drain(&self) -> Vec<ScheduledJob> {
        std::mem::take(&mut *self.jobs.lock())
    }
}

#[async_trait]
impl DownstreamQueue for InMemoryQueue {
    async fn depth(&self) -> Result<usize, QueueError> {
        Ok(self.len() + self.background_depth.load(Ordering::SeqCst))
    }

    async fn enqueue(
        &self,
        job: BatchJob,
        not_before: DateTime<Utc>,
    ) -> Result<JobReceipt, QueueError> {
        let receipt = JobReceipt {
            job_id: job.id,
            not_before,
            record_count: job.len(),
        };
        tracing::trace!(queue = %self.name, job_id = %job.id, %not_before, "job enqueued");
        self.jobs.lock().push(ScheduledJob { job, not_before });
        Ok(receipt)
    }
}
