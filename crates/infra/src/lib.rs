//! # Calbridge Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite repositories for tasks, sync configuration, the run log, and the
//!   event/task ledger
//! - The Google Calendar adapter, its HTTP client, and the calendar list cache
//! - Configuration loading
//! - The periodic sync scheduler
//!
//! ## Architecture
//! - Implements traits defined in `calbridge-core`
//! - Depends on `calbridge-common`, `calbridge-domain` and `calbridge-core`
//! - Contains all "impure" code (I/O, network, clocks)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod scheduling;

// Re-export commonly used items
pub use database::*;
pub use errors::InfraError;
pub use http::*;
pub use integrations::*;
pub use scheduling::{SyncScheduler, SyncSchedulerConfig};
