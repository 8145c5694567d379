//! Relay Store
//!
//! Durable cross-invocation state for change batching.
//!
//! # Overview
//!
//! - [`KeyValueStore`]: Versioned shared store with compare-and-swap
//! - [`MemoryStore`]: In-process store for tests and simulation
//! - [`BatchStore`]: Pending batch and last-dispatch time on top of any store
//!
//! Every batch mutation is a versioned compare-and-swap, so concurrent
//! merges and clears never overwrite each other's records.
//!
//! # Example
//!
//! ```rust
//! use relay_record::ChangeRecord;
//! use relay_store::{BatchKeys, BatchStore, MemoryStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), relay_store::StoreError> {
//! let store = BatchStore::new(Arc::new(MemoryStore::new()), BatchKeys::default());
//!
//! let record = ChangeRecord::new("ada@example.com").unwrap();
//! let pending = store.merge_and_store(vec![record]).await?;
//! assert_eq!(pending.len(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod batch;
pub mod error;
pub mod kv;
pub mod memory;

// Re-exports
pub use batch::{BatchKeys, BatchStore, DEFAULT_MAX_CAS_ATTEMPTS};
pub use error::StoreError;
pub use kv::{CasOutcome, KeyValueStore, VersionedValue};
pub use memory::MemoryStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
