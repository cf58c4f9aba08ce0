//! Port interfaces for sync persistence
//!
//! Task store, per-user configuration, the append-only run log, and the
//! event/task ledger.

use std::time::Duration;

use async_trait::async_trait;
use calbridge_domain::{
    ConfigStatus, Credentials, Result, SyncConfiguration, SyncLogEntry, SyncRecord, Task,
    TimeWindow,
};
use chrono::{DateTime, Utc};

/// Trait for the internal task store
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Get a task owned by `user_id`
    async fn get_task(&self, user_id: &str, task_id: &str) -> Result<Option<Task>>;

    /// Insert a new task
    async fn insert_task(&self, task: &Task) -> Result<()>;

    /// Overwrite an existing task
    async fn update_task(&self, task: &Task) -> Result<()>;

    /// Tasks whose due date (or start date when undated) falls inside `window`
    async fn list_tasks_in_window(&self, user_id: &str, window: &TimeWindow) -> Result<Vec<Task>>;
}

/// Trait for per-user sync configuration
#[async_trait]
pub trait SyncConfigRepository: Send + Sync {
    async fn get_config(&self, user_id: &str) -> Result<Option<SyncConfiguration>>;

    /// Insert the row, or update its user-editable columns. The run state
    /// (`status`, `sync_started_at`, `last_sync_at`) of an existing row is
    /// left to `try_begin_run` and `finish_run`.
    async fn save_settings(&self, config: &SyncConfiguration) -> Result<()>;

    /// Replace stored credentials only
    async fn save_credentials(
        &self,
        user_id: &str,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Atomically move an enabled configuration to `syncing`
    ///
    /// Succeeds when the row is not syncing or its lease is older than
    /// `lease_ttl`. Returns `false` when another run holds the lease.
    async fn try_begin_run(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        lease_ttl: Duration,
    ) -> Result<bool>;

    /// Release the lease and record the run's completion
    async fn finish_run(
        &self,
        user_id: &str,
        status: ConfigStatus,
        completed_at: DateTime<Utc>,
    ) -> Result<()>;

    /// All enabled configurations
    async fn list_enabled(&self) -> Result<Vec<SyncConfiguration>>;
}

/// Trait for the append-only run log
#[async_trait]
pub trait SyncLogRepository: Send + Sync {
    /// Record the start of a run
    async fn start_log(&self, entry: &SyncLogEntry) -> Result<()>;

    /// Finalize a run; fails with `Conflict` if the entry was already finalized
    async fn finalize_log(&self, entry: &SyncLogEntry) -> Result<()>;

    /// Most recent entries for a user, newest first
    async fn recent_logs(&self, user_id: &str, limit: usize) -> Result<Vec<SyncLogEntry>>;
}

/// Trait for the event/task ledger
#[async_trait]
pub trait SyncRecordRepository: Send + Sync {
    async fn find_by_external_id(
        &self,
        user_id: &str,
        external_event_id: &str,
    ) -> Result<Option<SyncRecord>>;

    /// Most recent binding of a task
    async fn find_by_task_id(&self, user_id: &str, task_id: &str) -> Result<Option<SyncRecord>>;

    /// Insert a binding; violating either uniqueness rule is a `Conflict`
    async fn insert_record(&self, record: &SyncRecord) -> Result<()>;

    /// Stamp `last_sync_at` on a binding that matched again
    async fn touch_record(&self, record_id: &str, now: DateTime<Utc>) -> Result<()>;

    /// Flag a binding whose last export failed; the next touch or repoint
    /// clears it
    async fn mark_record_error(&self, record_id: &str) -> Result<()>;

    /// Point a binding at a replacement external event
    async fn repoint_record(
        &self,
        record_id: &str,
        external_event_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()>;
}
