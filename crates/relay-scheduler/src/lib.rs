//! Relay Scheduler
//!
//! Decides when a pending change batch is flushed downstream.
//!
//! # Core Concepts
//!
//! - [`SchedulerPolicy`]: urgency threshold, rate-limit window, idle grace period
//! - [`DispatchScheduler`]: pure decision function over batch size, queue
//!   depth, last dispatch and the current instant
//! - [`DispatchDecision`]: hold, or flush no earlier than a given instant
//!
//! # Example
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use relay_scheduler::DispatchScheduler;
//!
//! let scheduler = DispatchScheduler::default();
//! let now = Utc::now();
//!
//! // Idle queue, never dispatched before: flush after the grace period
//! let decision = scheduler.decide_len(3, 0, None, now);
//! assert_eq!(decision.delay(), Some(now + Duration::seconds(8)));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod decision;
mod policy;
mod scheduler;

// Re-exports
pub use decision::{DispatchDecision, FlushReason, HoldReason};
pub use policy::{
    SchedulerPolicy, IDLE_FLUSH_DELAY_SECS, RATE_LIMIT_WINDOW_SECS, URGENCY_THRESHOLD,
};
pub use scheduler::DispatchScheduler;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
