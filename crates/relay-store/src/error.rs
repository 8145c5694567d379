//! Error types for the batch store

/// Shared store failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be read or written
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be encoded or decoded
    #[error("malformed value under `{key}`: {source}")]
    Codec {
        /// Key holding the value
        key: String,
        /// Underlying serde failure
        #[source]
        source: serde_json::Error,
    },

    /// Compare-and-swap kept losing to concurrent writers
    #[error("compare-and-swap on `{key}` gave up after {attempts} attempts")]
    Contention {
        /// Contended key
        key: String,
        /// Attempts made
        attempts: usize,
    },
}

impl StoreError {
    /// Create unavailable error
    #[inline]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Check if a later attempt may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Contention { .. })
    }
}
