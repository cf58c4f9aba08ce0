//! Background scheduling
//!
//! Periodic sync driver for configurations whose frequency is due.

pub mod error;
pub mod sync_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use sync_scheduler::{SyncScheduler, SyncSchedulerConfig, TickSummary};
