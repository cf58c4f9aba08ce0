//! # Calbridge Domain
//!
//! Business domain types and models for the task/calendar sync engine.
//!
//! This crate contains:
//! - Domain data types (tasks, external events, sync configuration, ledger)
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other Calbridge crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
