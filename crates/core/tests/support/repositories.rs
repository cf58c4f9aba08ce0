//! In-memory implementations of the sync persistence ports
//!
//! Each mock keeps its rows behind a mutex and exposes snapshot helpers so
//! tests can compare store contents before and after a run.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use calbridge_core::sync::ports::{
    SyncConfigRepository, SyncLogRepository, SyncRecordRepository, TaskRepository,
};
use calbridge_domain::{
    CalBridgeError, ConfigStatus, Credentials, Result as DomainResult, SyncConfiguration,
    SyncLogEntry, SyncRecord, SyncRecordStatus, Task, TimeWindow,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

// =============================================================================
// Tasks
// =============================================================================

/// In-memory task store keyed by task id.
#[derive(Default, Clone)]
pub struct MockTaskRepository {
    tasks: Arc<Mutex<BTreeMap<String, Task>>>,
    fail_insert_titles: Arc<Mutex<HashSet<String>>>,
}

impl MockTaskRepository {
    pub fn insert(&self, task: Task) {
        self.tasks.lock().insert(task.id.clone(), task);
    }

    /// Make `insert_task` fail for tasks with this title.
    pub fn fail_insert_for(&self, title: &str) {
        self.fail_insert_titles.lock().insert(title.to_string());
    }

    pub fn snapshot(&self) -> BTreeMap<String, Task> {
        self.tasks.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }
}

#[async_trait]
impl TaskRepository for MockTaskRepository {
    async fn get_task(&self, user_id: &str, task_id: &str) -> DomainResult<Option<Task>> {
        Ok(self.tasks.lock().get(task_id).filter(|task| task.user_id == user_id).cloned())
    }

    async fn insert_task(&self, task: &Task) -> DomainResult<()> {
        if self.fail_insert_titles.lock().contains(&task.title) {
            return Err(CalBridgeError::Database(format!("insert rejected for {}", task.title)));
        }
        self.tasks.lock().insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn update_task(&self, task: &Task) -> DomainResult<()> {
        let mut tasks = self.tasks.lock();
        match tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task.clone();
                Ok(())
            }
            None => Err(CalBridgeError::NotFound(format!("task {}", task.id))),
        }
    }

    async fn list_tasks_in_window(
        &self,
        user_id: &str,
        window: &TimeWindow,
    ) -> DomainResult<Vec<Task>> {
        Ok(self
            .tasks
            .lock()
            .values()
            .filter(|task| task.user_id == user_id)
            .filter(|task| task.anchor_date().is_some_and(|anchor| window.contains(anchor)))
            .cloned()
            .collect())
    }
}

// =============================================================================
// Sync configuration
// =============================================================================

/// In-memory configuration store with a real compare-and-set lease.
#[derive(Default, Clone)]
pub struct MockConfigRepository {
    configs: Arc<Mutex<BTreeMap<String, SyncConfiguration>>>,
    saved_credentials: Arc<Mutex<Vec<Credentials>>>,
}

impl MockConfigRepository {
    pub fn with_config(self, config: SyncConfiguration) -> Self {
        self.put(config);
        self
    }

    pub fn put(&self, config: SyncConfiguration) {
        self.configs.lock().insert(config.user_id.clone(), config);
    }

    pub fn get(&self, user_id: &str) -> Option<SyncConfiguration> {
        self.configs.lock().get(user_id).cloned()
    }

    /// Every credential set persisted through `save_credentials`.
    pub fn saved_credentials(&self) -> Vec<Credentials> {
        self.saved_credentials.lock().clone()
    }
}

#[async_trait]
impl SyncConfigRepository for MockConfigRepository {
    async fn get_config(&self, user_id: &str) -> DomainResult<Option<SyncConfiguration>> {
        Ok(self.get(user_id))
    }

    async fn save_settings(&self, config: &SyncConfiguration) -> DomainResult<()> {
        let mut configs = self.configs.lock();
        let mut stored = config.clone();
        if let Some(existing) = configs.get(&config.user_id) {
            stored.status = existing.status;
            stored.sync_started_at = existing.sync_started_at;
            stored.last_sync_at = existing.last_sync_at;
            stored.created_at = existing.created_at;
        }
        configs.insert(config.user_id.clone(), stored);
        Ok(())
    }

    async fn save_credentials(
        &self,
        user_id: &str,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut configs = self.configs.lock();
        let config = configs
            .get_mut(user_id)
            .ok_or_else(|| CalBridgeError::NotFound(format!("config {user_id}")))?;
        config.credentials = Some(credentials.clone());
        config.updated_at = now;
        self.saved_credentials.lock().push(credentials.clone());
        Ok(())
    }

    async fn try_begin_run(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        lease_ttl: Duration,
    ) -> DomainResult<bool> {
        let mut configs = self.configs.lock();
        let Some(config) = configs.get_mut(user_id) else {
            return Ok(false);
        };
        let ttl = chrono::Duration::from_std(lease_ttl).unwrap_or(chrono::Duration::MAX);
        let lease_free = config.status != ConfigStatus::Syncing
            || config.sync_started_at.map_or(true, |started| started + ttl <= now);
        if !config.enabled || !lease_free {
            return Ok(false);
        }
        config.status = ConfigStatus::Syncing;
        config.sync_started_at = Some(now);
        Ok(true)
    }

    async fn finish_run(
        &self,
        user_id: &str,
        status: ConfigStatus,
        completed_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if let Some(config) = self.configs.lock().get_mut(user_id) {
            config.status = status;
            config.sync_started_at = None;
            config.last_sync_at = Some(completed_at);
        }
        Ok(())
    }

    async fn list_enabled(&self) -> DomainResult<Vec<SyncConfiguration>> {
        Ok(self.configs.lock().values().filter(|config| config.enabled).cloned().collect())
    }
}

// =============================================================================
// Run log
// =============================================================================

#[derive(Default, Clone)]
pub struct MockLogRepository {
    entries: Arc<Mutex<Vec<SyncLogEntry>>>,
}

impl MockLogRepository {
    pub fn entries(&self) -> Vec<SyncLogEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl SyncLogRepository for MockLogRepository {
    async fn start_log(&self, entry: &SyncLogEntry) -> DomainResult<()> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }

    async fn finalize_log(&self, entry: &SyncLogEntry) -> DomainResult<()> {
        let mut entries = self.entries.lock();
        let stored = entries
            .iter_mut()
            .find(|stored| stored.id == entry.id)
            .ok_or_else(|| CalBridgeError::NotFound(format!("log {}", entry.id)))?;
        if stored.is_finalized() {
            return Err(CalBridgeError::Conflict(format!("log {} already finalized", entry.id)));
        }
        *stored = entry.clone();
        Ok(())
    }

    async fn recent_logs(&self, user_id: &str, limit: usize) -> DomainResult<Vec<SyncLogEntry>> {
        Ok(self
            .entries
            .lock()
            .iter()
            .rev()
            .filter(|entry| entry.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// In-memory ledger enforcing both uniqueness rules.
#[derive(Default, Clone)]
pub struct MockRecordRepository {
    records: Arc<Mutex<Vec<SyncRecord>>>,
}

impl MockRecordRepository {
    pub fn insert(&self, record: SyncRecord) {
        self.records.lock().push(record);
    }

    pub fn snapshot(&self) -> Vec<SyncRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl SyncRecordRepository for MockRecordRepository {
    async fn find_by_external_id(
        &self,
        user_id: &str,
        external_event_id: &str,
    ) -> DomainResult<Option<SyncRecord>> {
        Ok(self
            .records
            .lock()
            .iter()
            .find(|r| r.user_id == user_id && r.external_event_id == external_event_id)
            .cloned())
    }

    async fn find_by_task_id(
        &self,
        user_id: &str,
        task_id: &str,
    ) -> DomainResult<Option<SyncRecord>> {
        Ok(self
            .records
            .lock()
            .iter()
            .rev()
            .find(|r| r.user_id == user_id && r.task_id == task_id)
            .cloned())
    }

    async fn insert_record(&self, record: &SyncRecord) -> DomainResult<()> {
        let mut records = self.records.lock();
        let duplicate = records.iter().any(|r| {
            r.user_id == record.user_id
                && (r.external_event_id == record.external_event_id
                    || (r.task_id == record.task_id && r.calendar_id == record.calendar_id))
        });
        if duplicate {
            return Err(CalBridgeError::Conflict("duplicate ledger binding".into()));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn touch_record(&self, record_id: &str, now: DateTime<Utc>) -> DomainResult<()> {
        let mut records = self.records.lock();
        let record = records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| CalBridgeError::NotFound(format!("record {record_id}")))?;
        record.last_sync_at = now;
        record.sync_status = SyncRecordStatus::Synced;
        Ok(())
    }

    async fn mark_record_error(&self, record_id: &str) -> DomainResult<()> {
        let mut records = self.records.lock();
        let record = records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| CalBridgeError::NotFound(format!("record {record_id}")))?;
        record.sync_status = SyncRecordStatus::Error;
        Ok(())
    }

    async fn repoint_record(
        &self,
        record_id: &str,
        external_event_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut records = self.records.lock();
        let record = records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| CalBridgeError::NotFound(format!("record {record_id}")))?;
        record.external_event_id = external_event_id.to_string();
        record.last_sync_at = now;
        record.sync_status = SyncRecordStatus::Synced;
        Ok(())
    }
}
