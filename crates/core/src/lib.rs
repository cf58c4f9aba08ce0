//! # Calbridge Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for the task store, the ledger, the run
//!   log, sync configuration, and the external calendar service
//! - The event–task mapper and the token manager
//! - Use cases: sync orchestration, the sync trigger, sync settings
//!
//! ## Architecture Principles
//! - Only depends on `calbridge-common` and `calbridge-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod calendar;
pub mod sync;

pub use calendar::{CalendarAccess, CalendarCatalog, CalendarService, TokenManager};
pub use sync::{
    RunRejection, SelectionUpdate, SyncConfigRepository, SyncLogRepository, SyncOrchestrator,
    SyncPorts, SyncRecordRepository, SyncSettingsService, SyncTrigger, TaskRepository,
};
