//! Relay Simulator
//!
//! Synthetic mutation load for the change coalescer: a population of users
//! repeatedly updating their name and time zone, on a manual clock, against
//! in-memory store and queue.
//!
//! # Example
//!
//! ```rust
//! use relay_sim::{run_simulator, SimulatorConfig};
//!
//! # async fn example() -> Result<(), relay_core::RelayError> {
//! let report = run_simulator(SimulatorConfig::default()).await?;
//! assert!(report.passed());
//! println!("{}", report.generate_text());
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]

pub mod catalog;
pub mod simulator;

pub use catalog::{random_name, TimeZoneCatalog};
pub use simulator::{
    run_simulator, simulation_epoch, user_identity, SimulatorConfig, SimulatorReport,
    SimulatorStats, Violation,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
