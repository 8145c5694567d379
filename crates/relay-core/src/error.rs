//! Error types for Relay Core
//!
//! Provides error handling for:
//! - Malformed mutations (no identity)
//! - Shared store failures
//! - Downstream queue failures
//! - Configuration errors
//!
//! None of these is fatal to the process: batching is a side effect of the
//! mutation, not part of it.

use crate::queue::JobId;
use relay_record::RecordError;
use relay_store::StoreError;
use std::path::PathBuf;

/// Main Relay error type
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Mutation rejected before reaching the store
    #[error("malformed record: {0}")]
    MalformedRecord(#[from] RecordError),

    /// Shared store read or write failed
    #[error("batch store failed: {0}")]
    Store(#[from] StoreError),

    /// Downstream queue failed; batch state was left untouched
    #[error("downstream queue failed: {0}")]
    Queue(#[from] QueueError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RelayError {
    /// Check if a later trigger may succeed with the same data
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Queue(e) => e.is_retryable(),
            Self::MalformedRecord(_) | Self::Config(_) => false,
        }
    }
}

/// Downstream queue errors
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Queue cannot be reached
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    /// Queue refused the job
    #[error("job {job_id} rejected: {reason}")]
    Rejected {
        /// Rejected job
        job_id: JobId,
        /// Queue-provided reason
        reason: String,
    },
}

impl QueueError {
    /// Create unavailable error
    #[inline]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Check if retrying may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for this schema
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid config value: {0}")]
    Invalid(String),
}
