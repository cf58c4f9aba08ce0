//! Modular common utilities shared across Calbridge crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: clock abstraction
//! - `runtime`: rate limiting (pulls in `observability`)
//! - `observability`: tracing

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod time;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

#[cfg(feature = "runtime")]
pub use resilience::{RateLimitExceeded, RateLimiter, RateLimiterConfig};
#[cfg(feature = "foundation")]
pub use time::{Clock, MockClock, SystemClock};
