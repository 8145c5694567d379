//! Change coalescing pipeline
//!
//! Every mutation runs the same steps:
//! record → merge into the shared batch → fresh read of batch, queue depth
//! and last dispatch → decide → flush on a positive decision.
//!
//! Decide-and-flush runs under a per-process async gate. Writers in other
//! processes are kept consistent by the store's compare-and-swap.

use crate::clock::{Clock, SystemClock};
use crate::config::RelayConfig;
use crate::dispatcher::{Dispatcher, FlushReceipt};
use crate::error::RelayError;
use crate::queue::DownstreamQueue;
use chrono::{DateTime, Utc};
use relay_record::{ChangeRecord, ChangeRecorder, MonitoredEntity};
use relay_scheduler::{DispatchDecision, DispatchScheduler};
use relay_store::{BatchStore, KeyValueStore};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One flush evaluation over the stored batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Pending records seen by the scheduler
    pub pending_len: usize,
    /// Downstream queue depth seen by the scheduler
    pub queue_depth: usize,
    /// Last dispatch time seen by the scheduler
    pub last_dispatch: Option<DateTime<Utc>>,
    /// Evaluation instant
    pub now: DateTime<Utc>,
    /// Scheduler output
    pub decision: DispatchDecision,
    /// Present when a job was enqueued
    pub flush: Option<FlushReceipt>,
}

impl Evaluation {
    /// Whether this evaluation enqueued a job
    #[inline]
    #[must_use]
    pub fn flushed(&self) -> bool {
        self.flush.is_some()
    }
}

/// Outcome of one mutation trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerOutcome {
    /// Record merged into the batch
    pub record: ChangeRecord,
    /// Evaluation that followed the merge
    pub evaluation: Evaluation,
}

/// Trigger pipeline over a shared store and a downstream queue
pub struct ChangeCoalescer {
    recorder: ChangeRecorder,
    store: BatchStore,
    scheduler: DispatchScheduler,
    dispatcher: Dispatcher,
    queue: Arc<dyn DownstreamQueue>,
    clock: Arc<dyn Clock>,
    flush_gate: Mutex<()>,
}

impl ChangeCoalescer {
    /// Create coalescer from configuration
    ///
    /// # Errors
    /// `RelayError::Config` if the configuration does not validate
    pub fn new(
        config: &RelayConfig,
        kv: Arc<dyn KeyValueStore>,
        queue: Arc<dyn DownstreamQueue>,
    ) -> Result<Self, RelayError> {
        let scheduler = DispatchScheduler::new(config.scheduler_policy()?);
        let store = BatchStore::new(kv, config.batch_keys()).with_max_attempts(config.max_cas_attempts);

        Ok(Self {
            recorder: ChangeRecorder::new(),
            dispatcher: Dispatcher::new(queue.clone(), store.clone()),
            store,
            scheduler,
            queue,
            clock: Arc::new(SystemClock),
            flush_gate: Mutex::new(()),
        })
    }

    /// With a different time source
    #[inline]
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Underlying batch store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &BatchStore {
        &self.store
    }

    /// Active scheduler
    #[inline]
    #[must_use]
    pub fn scheduler(&self) -> &DispatchScheduler {
        &self.scheduler
    }

    /// Record a mutation, merge it and evaluate a flush
    ///
    /// # Errors
    /// - `RelayError::MalformedRecord` before anything is stored
    /// - `RelayError::Store` or `RelayError::Queue` from the later steps
    pub async fn on_mutation<E>(&self, entity: &E) -> Result<TriggerOutcome, RelayError>
    where
        E: MonitoredEntity + Sync + ?Sized,
    {
        let record = self.recorder.record(entity)?;

        let merged = self.store.merge_and_store(vec![record.clone()]).await?;
        tracing::trace!(identity = record.identity(), pending = merged.len(), "change merged");

        let evaluation = self.evaluate().await?;
        Ok(TriggerOutcome { record, evaluation })
    }

    /// Observer entry point: like `on_mutation` but never fails
    ///
    /// Batching is a side effect of the mutation, so failures are logged and
    /// swallowed. A retryable failure is picked up by the next trigger.
    pub async fn observe<E>(&self, entity: &E) -> Option<TriggerOutcome>
    where
        E: MonitoredEntity + Sync + ?Sized,
    {
        match self.on_mutation(entity).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!(
                    identity = entity.identity(),
                    retryable = e.is_retryable(),
                    "change batching failed: {}",
                    e
                );
                None
            }
        }
    }

    /// Re-run the flush decision over the stored batch
    ///
    /// Used after every merge and by timers that want a held batch to go out
    /// once its window passes without waiting for another mutation.
    ///
    /// # Errors
    /// Store or queue failure
    pub async fn evaluate(&self) -> Result<Evaluation, RelayError> {
        let _gate = self.flush_gate.lock().await;

        let pending = self.store.load_pending().await?;
        let queue_depth = self.queue.depth().await?;
        let last_dispatch = self.store.load_last_dispatch_time().await?;
        let now = self.clock.now();

        let decision = self.scheduler.decide(&pending, queue_depth, last_dispatch, now);
        tracing::debug!(
            pending = pending.len(),
            queue_depth,
            last_dispatch = ?last_dispatch,
            %now,
            ?decision,
            "flush evaluated"
        );

        let flush = self.dispatcher.flush(&pending, &decision, now).await?;

        Ok(Evaluation {
            pending_len: pending.len(),
            queue_depth,
            last_dispatch,
            now,
            decision,
            flush,
        })
    }
}

impl fmt::Debug for ChangeCoalescer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeCoalescer")
            .field("store", &self.store)
            .field("scheduler", &self.scheduler)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
