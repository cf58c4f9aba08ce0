//! # Calbridge API
//!
//! HTTP application layer and process entry point.
//!
//! This crate contains:
//! - Application context (dependency injection)
//! - axum routes for the sync trigger, settings and health
//! - Logging and health utilities
//!
//! ## Architecture
//! - Depends on `common`, `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture

pub mod context;
pub mod routes;
pub mod utils;

pub use context::*;
pub use routes::router;
