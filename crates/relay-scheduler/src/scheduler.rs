//! Flush decision core
//!
//! The rate limit keeps a new downstream job from being created for every
//! single change; urgency keeps the backlog bounded regardless of timing; an
//! idle downstream queue lets changes go out promptly instead of waiting out
//! the full window.

use crate::decision::{DispatchDecision, FlushReason, HoldReason};
use crate::policy::SchedulerPolicy;
use chrono::{DateTime, Duration, Utc};
use relay_record::PendingBatch;

/// Pure flush scheduler
///
/// `decide` depends only on its arguments; re-evaluating unchanged inputs
/// always yields the same decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchScheduler {
    policy: SchedulerPolicy,
}

impl DispatchScheduler {
    /// Create scheduler with a policy
    #[inline]
    #[must_use]
    pub fn new(policy: SchedulerPolicy) -> Self {
        Self { policy }
    }

    /// Active policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &SchedulerPolicy {
        &self.policy
    }

    /// Decide whether and when to flush `pending`
    #[inline]
    #[must_use]
    pub fn decide(
        &self,
        pending: &PendingBatch,
        queue_depth: usize,
        last_dispatch: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DispatchDecision {
        self.decide_len(pending.len(), queue_depth, last_dispatch, now)
    }

    /// Decide for a batch of `pending_len` records
    ///
    /// # Procedure
    /// 1. Urgent when the batch reached the threshold; idle when depth is 0
    /// 2. Neither: hold
    /// 3. Not urgent and still inside the rate-limit window: hold
    /// 4. Idle queue: flush at `now + idle_flush_delay`
    /// 5. Busy but urgent: flush at the next rate-limit boundary
    #[must_use]
    pub fn decide_len(
        &self,
        pending_len: usize,
        queue_depth: usize,
        last_dispatch: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DispatchDecision {
        let urgent = self.is_urgent(pending_len);
        let queue_idle = queue_depth == 0;

        if !urgent && !queue_idle {
            return DispatchDecision::Hold {
                reason: HoldReason::QueueBusy { queue_depth },
            };
        }

        let next_allowed = self.next_allowed(last_dispatch, now);

        // Urgency bypasses the rate limit entirely
        if !urgent && now < next_allowed {
            return DispatchDecision::Hold {
                reason: HoldReason::RateLimited { next_allowed },
            };
        }

        if queue_idle {
            DispatchDecision::Flush {
                not_before: saturating_add(now, self.policy.idle_flush_delay),
                reason: FlushReason::IdleQueue { urgent },
            }
        } else {
            DispatchDecision::Flush {
                not_before: next_allowed,
                reason: FlushReason::UrgentBacklog { queue_depth },
            }
        }
    }

    /// Whether a batch of this size forces a flush
    #[inline]
    #[must_use]
    pub fn is_urgent(&self, pending_len: usize) -> bool {
        pending_len >= self.policy.urgency_threshold
    }

    /// Earliest instant a non-urgent flush is allowed
    ///
    /// Without a prior dispatch there is no constraint, so this is `now`.
    /// Saturates at the latest representable instant.
    #[inline]
    #[must_use]
    pub fn next_allowed(
        &self,
        last_dispatch: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        last_dispatch.map_or(now, |last| {
            saturating_add(last, self.policy.rate_limit_window)
        })
    }
}

fn saturating_add(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    at.checked_add_signed(by).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
