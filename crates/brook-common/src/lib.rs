#![deny(missing_docs)]

//! Shared configuration, error types, and observability primitives for brook
//! crates.
//!
//! Architecture role:
//! - defines the engine configuration passed across layers
//! - provides the common [`BrookError`] / [`Result`] contracts
//! - hosts the execution-stats callback types

/// Engine configuration shared by containers and operators.
pub mod config;
/// Shared error taxonomy.
pub mod error;
/// Execution statistics reported through the stats callback seam.
pub mod stats;

pub use config::EngineConfig;
pub use error::{BrookError, Result};
pub use stats::{ExecStats, YieldStats};
