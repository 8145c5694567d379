//! Batch dispatch
//!
//! Turns a positive flush decision into one downstream job, then records the
//! dispatch and removes the flushed records from the store. Nothing is mutated
//! unless the queue accepted the job.

use crate::error::RelayError;
use crate::queue::{BatchJob, DownstreamQueue, JobReceipt};
use chrono::{DateTime, Utc};
use relay_record::PendingBatch;
use relay_scheduler::{DispatchDecision, FlushReason};
use relay_store::BatchStore;
use std::fmt;
use std::sync::Arc;

/// Result of a completed flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReceipt {
    /// Queue acknowledgement
    pub job: JobReceipt,
    /// Why the batch went out
    pub reason: FlushReason,
    /// Last dispatch time stored after the flush
    pub rate_window_anchor: DateTime<Utc>,
    /// Records merged while the flush was in flight, still pending
    pub retained: usize,
}

/// Enqueues flushed batches and resets batch state
#[derive(Clone)]
pub struct Dispatcher {
    queue: Arc<dyn DownstreamQueue>,
    store: BatchStore,
}

impl Dispatcher {
    /// Create dispatcher
    #[inline]
    #[must_use]
    pub fn new(queue: Arc<dyn DownstreamQueue>, store: BatchStore) -> Self {
        Self { queue, store }
    }

    /// Flush `pending` as the decision says
    ///
    /// Returns `None` for a hold or an empty batch. The job is handed off and
    /// never awaited.
    ///
    /// # Procedure
    /// 1. Enqueue one job with `not_before` = the decision's delay
    /// 2. Store the delay as the last dispatch time
    /// 3. Remove exactly the flushed records
    ///
    /// # Errors
    /// - `RelayError::Queue` if the job was not accepted; store untouched
    /// - `RelayError::Store` if bookkeeping failed after the job was accepted
    pub async fn flush(
        &self,
        pending: &PendingBatch,
        decision: &DispatchDecision,
        now: DateTime<Utc>,
    ) -> Result<Option<FlushReceipt>, RelayError> {
        let DispatchDecision::Flush { not_before, reason } = *decision else {
            return Ok(None);
        };
        if pending.is_empty() {
            tracing::debug!("flush requested for empty batch; nothing to dispatch");
            return Ok(None);
        }

        let job = BatchJob::new(pending.clone(), now);
        let job_id = job.id;
        let job = match self.queue.enqueue(job, not_before).await {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::warn!(
                    %job_id,
                    records = pending.len(),
                    "enqueue failed, batch stays pending: {}",
                    e
                );
                return Err(e.into());
            }
        };

        match reason {
            FlushReason::IdleQueue { .. } => tracing::info!(
                %job_id,
                records = job.record_count,
                %not_before,
                "Batch dispatched to idle queue"
            ),
            FlushReason::UrgentBacklog { queue_depth } => tracing::info!(
                %job_id,
                records = job.record_count,
                queue_depth,
                %not_before,
                "Urgent batch delayed due to active jobs"
            ),
        }

        let anchor = self
            .store
            .store_last_dispatch_time(not_before)
            .await
            .map_err(|e| {
                tracing::error!(%job_id, "job enqueued but last dispatch time not stored: {}", e);
                e
            })?;

        let remaining = self
            .store
            .clear_flushed(pending)
            .await
            .map_err(|e| {
                tracing::error!(%job_id, "job enqueued but pending batch not cleared: {}", e);
                e
            })?;

        if !remaining.is_empty() {
            tracing::debug!(
                retained = remaining.len(),
                "records merged during flush stay pending"
            );
        }

        Ok(Some(FlushReceipt {
            job,
            reason,
            rate_window_anchor: anchor,
            retained: remaining.len(),
        }))
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
