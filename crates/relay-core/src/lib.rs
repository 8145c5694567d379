//! Relay Core - change coalescing and delayed batch dispatch
//!
//! Collects change records from many independent writers into one shared
//! pending batch and decides when to hand it to a downstream queue:
//! - Rate limit between non-urgent flushes
//! - Urgency override once the backlog reaches a threshold
//! - Short grace delay when the downstream queue is idle
//!
//! # Example
//!
//! ```rust
//! use relay_core::{ChangeCoalescer, InMemoryQueue, RelayConfig};
//! use relay_record::MutationEvent;
//! use relay_store::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), relay_core::RelayError> {
//! let queue = Arc::new(InMemoryQueue::new("subscribers"));
//! let coalescer = ChangeCoalescer::new(
//!     &RelayConfig::default(),
//!     Arc::new(MemoryStore::new()),
//!     queue.clone(),
//! )?;
//!
//! let event = MutationEvent::new("ada@example.com").with_change("name", "Ada");
//! let outcome = coalescer.on_mutation(&event).await?;
//!
//! if outcome.evaluation.flushed() {
//!     println!("{} job(s) waiting downstream", queue.len());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

pub mod clock;
pub mod coalescer;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod queue;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use coalescer::{ChangeCoalescer, Evaluation, TriggerOutcome};
pub use config::{RelayConfig, MAX_INTERVAL_SECS};
pub use dispatcher::{Dispatcher, FlushReceipt};
pub use error::{ConfigError, QueueError, RelayError};
pub use queue::{BatchJob, DownstreamQueue, InMemoryQueue, JobId, JobReceipt, ScheduledJob};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for wiring a coalescer
    pub use crate::{
        ChangeCoalescer, Clock, DownstreamQueue, Evaluation, InMemoryQueue, ManualClock,
        RelayConfig, RelayError, TriggerOutcome,
    };
    pub use relay_record::{MonitoredEntity, MutationEvent};
    pub use relay_scheduler::DispatchDecision;
    pub use relay_store::{KeyValueStore, MemoryStore};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
