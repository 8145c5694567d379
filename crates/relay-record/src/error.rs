//! Error types for change recording

use crate::field::TrackedField;

/// Rejection of a mutation that cannot become a change record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// The mutation carried no usable identity
    #[error("mutation has no identity")]
    MissingIdentity,

    /// A tracked field was flagged dirty but no new value was supplied
    #[error("field `{field}` is dirty for {identity} but has no value")]
    MissingValue {
        /// Identity of the offending entity
        identity: String,
        /// The dirty field without a value
        field: TrackedField,
    },
}
