//! Flush policy parameters

use chrono::Duration;

/// Pending records at which a flush is forced regardless of timing
pub const URGENCY_THRESHOLD: usize = 1000;

/// Minimum spacing between non-urgent flushes, in seconds
pub const RATE_LIMIT_WINDOW_SECS: i64 = 80;

/// Grace period before an idle-queue flush runs, in seconds
pub const IDLE_FLUSH_DELAY_SECS: i64 = 8;

/// Parameters of the flush decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerPolicy {
    /// Batch size that makes a flush urgent
    pub urgency_threshold: usize,
    /// Rate-limit window measured from the last dispatch
    pub rate_limit_window: Duration,
    /// Delay applied to flushes into an idle queue
    pub idle_flush_delay: Duration,
}

impl SchedulerPolicy {
    /// Create default policy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With urgency threshold
    #[inline]
    #[must_use]
    pub fn with_urgency_threshold(mut self, threshold: usize) -> Self {
        self.urgency_threshold = threshold;
        self
    }

    /// With rate-limit window
    #[inline]
    #[must_use]
    pub fn with_rate_limit_window(mut self, window: Duration) -> Self {
        self.rate_limit_window = window;
        self
    }

    /// With idle flush delay
    #[inline]
    #[must_use]
    pub fn with_idle_flush_delay(mut self, delay: Duration) -> Self {
        self.idle_flush_delay = delay;
        self
    }
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        Self {
            urgency_threshold: URGENCY_THRESHOLD,
            rate_limit_window: Duration::seconds(RATE_LIMIT_WINDOW_SECS),
            idle_flush_delay: Duration::seconds(IDLE_FLUSH_DELAY_SECS),
        }
    }
}
