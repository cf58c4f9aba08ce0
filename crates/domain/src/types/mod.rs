//! Domain types and models
//!
//! Grouped by the side of the sync they belong to: internal tasks, external
//! calendar events, OAuth credentials, and the sync bookkeeping that ties the
//! two together.

pub mod credentials;
pub mod event;
pub mod sync;
pub mod task;

pub use credentials::Credentials;
pub use event::{
    AccessRole, CalendarListEntry, EventTime, ExternalEvent, ProvenanceMarker, TimeWindow,
};
pub use sync::{
    ConfigStatus, RunStatus, SyncConfiguration, SyncDirection, SyncError, SyncErrorKind,
    SyncFrequency, SyncLogEntry, SyncRecord, SyncRecordStatus, SyncReport, SyncRequest,
    SyncResult, TriggerResponse,
};
pub use task::{Task, TaskFields, TaskStatus};
