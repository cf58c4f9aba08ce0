//! Task/calendar synchronization: ports, mapper, and the run orchestration

use std::sync::Arc;

use crate::calendar::{CalendarCatalog, CalendarService};

pub mod errors;
pub mod mapper;
pub mod orchestrator;
pub mod ports;
pub mod settings;
pub mod trigger;

pub use errors::RunRejection;
pub use orchestrator::SyncOrchestrator;
pub use ports::{SyncConfigRepository, SyncLogRepository, SyncRecordRepository, TaskRepository};
pub use settings::{SelectionUpdate, SyncSettingsService};
pub use trigger::SyncTrigger;

/// Adapters a sync run needs
#[derive(Clone)]
pub struct SyncPorts {
    pub tasks: Arc<dyn TaskRepository>,
    pub records: Arc<dyn SyncRecordRepository>,
    pub configs: Arc<dyn SyncConfigRepository>,
    pub logs: Arc<dyn SyncLogRepository>,
    pub calendar: Arc<dyn CalendarService>,
    pub catalog: Arc<dyn CalendarCatalog>,
}
