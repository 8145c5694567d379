//! Relay Records
//!
//! Turns entity mutations into minimal change records.
//!
//! # Core Concepts
//!
//! - [`TrackedField`]: The fixed set of fields whose changes are propagated
//! - [`ChangeRecord`]: Identity plus only the fields that actually changed
//! - [`PendingBatch`]: Ordered accumulation of records awaiting dispatch
//! - [`ChangeRecorder`]: Builds a record from anything implementing [`MonitoredEntity`]
//!
//! # Example
//!
//! ```rust
//! use relay_record::{ChangeRecorder, MutationEvent, TrackedField};
//!
//! let event = MutationEvent::new("ada@example.com")
//!     .with_change("name", "Ada Lovelace")
//!     .with_value("timezone", "Europe/London");
//!
//! let record = ChangeRecorder::new().record(&event).unwrap();
//! assert_eq!(record.identity(), "ada@example.com");
//! assert_eq!(record.get(TrackedField::Name), Some("Ada Lovelace"));
//! assert_eq!(record.get(TrackedField::TimeZone), None);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod field;
mod record;
mod recorder;

// Re-exports
pub use error::RecordError;
pub use field::TrackedField;
pub use record::{ChangeRecord, PendingBatch};
pub use recorder::{ChangeRecorder, MonitoredEntity, MutationEvent};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for recording changes
    pub use crate::{
        ChangeRecord, ChangeRecorder, MonitoredEntity, MutationEvent, PendingBatch, RecordError,
        TrackedField,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
