//! Scheduler output

use chrono::{DateTime, Utc};

/// Outcome of one flush evaluation; never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchDecision {
    /// Leave the batch pending until a later trigger
    Hold {
        /// Why nothing is flushed
        reason: HoldReason,
    },
    /// Flush the batch as a job eligible no earlier than `not_before`
    Flush {
        /// Scheduled execution instant of the job
        not_before: DateTime<Utc>,
        /// Why the flush happens now
        reason: FlushReason,
    },
}

impl DispatchDecision {
    /// Whether the batch should be flushed
    #[inline]
    #[must_use]
    pub fn should_flush(&self) -> bool {
        matches!(self, Self::Flush { .. })
    }

    /// Scheduled instant of the flushed job
    #[inline]
    #[must_use]
    pub fn delay(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Flush { not_before, .. } => Some(*not_before),
            Self::Hold { .. } => None,
        }
    }
}

/// Reason a batch is held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// Too few records while downstream work is still outstanding
    QueueBusy {
        /// Outstanding downstream jobs
        queue_depth: usize,
    },
    /// Rate-limit window since the last dispatch has not elapsed
    RateLimited {
        /// Earliest instant a non-urgent flush is allowed
        next_allowed: DateTime<Utc>,
    },
}

/// Reason a batch is flushed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// Downstream queue is empty; job runs after the idle grace period
    IdleQueue {
        /// Whether the batch had also reached the urgency threshold
        urgent: bool,
    },
    /// Batch reached the urgency threshold while the queue is busy; job is
    /// pushed to the next rate-limit boundary
    UrgentBacklog {
        /// Outstanding downstream jobs
        queue_depth: usize,
    },
}
