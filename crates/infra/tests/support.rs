//! Shared fixtures for infra integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use calbridge_common::resilience::{RateLimiter, RateLimiterConfig};
use calbridge_common::time::{Clock, MockClock};
use calbridge_core::calendar::CalendarService;
use calbridge_core::sync::{SyncConfigRepository, SyncPorts};
use calbridge_domain::{
    Credentials, GoogleConfig, SyncConfiguration, SyncFrequency, Task, TaskFields, TaskStatus,
};
use calbridge_infra::database::{
    DbManager, SqliteSyncConfigRepository, SqliteSyncLogRepository, SqliteSyncRecordRepository,
    SqliteTaskRepository,
};
use calbridge_infra::http::{HttpClient, HttpSettings};
use calbridge_infra::integrations::{CalendarListCache, GoogleCalendarClient};
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

pub const USER: &str = "user-1";

/// Fixed wall-clock start for deterministic windows.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 14, 9, 0, 0).unwrap()
}

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("calbridge-test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("schema migrations should apply");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }
}

/// SQLite repositories over one test database.
pub struct Repositories {
    pub tasks: Arc<SqliteTaskRepository>,
    pub configs: Arc<SqliteSyncConfigRepository>,
    pub logs: Arc<SqliteSyncLogRepository>,
    pub records: Arc<SqliteSyncRecordRepository>,
}

impl Repositories {
    pub fn new(db: &TestDatabase) -> Self {
        Self {
            tasks: Arc::new(SqliteTaskRepository::new(Arc::clone(&db.manager))),
            configs: Arc::new(SqliteSyncConfigRepository::new(Arc::clone(&db.manager))),
            logs: Arc::new(SqliteSyncLogRepository::new(Arc::clone(&db.manager))),
            records: Arc::new(SqliteSyncRecordRepository::new(Arc::clone(&db.manager))),
        }
    }

    pub fn ports(&self, calendar: Arc<dyn CalendarService>) -> SyncPorts {
        let catalog =
            Arc::new(CalendarListCache::with_ttl(Arc::clone(&calendar), Duration::from_secs(600), 100));
        SyncPorts {
            tasks: self.tasks.clone(),
            records: self.records.clone(),
            configs: self.configs.clone(),
            logs: self.logs.clone(),
            calendar,
            catalog,
        }
    }
}

pub fn google_config(server_uri: &str) -> GoogleConfig {
    GoogleConfig {
        client_id: "client-id".into(),
        client_secret: "client-secret".into(),
        token_endpoint: format!("{server_uri}/token"),
        api_base: format!("{server_uri}/calendar/v3"),
    }
}

pub fn http_client() -> HttpClient {
    HttpClient::with_settings(HttpSettings {
        timeout: Duration::from_secs(5),
        read_attempts: 2,
        retry_delay: Duration::from_millis(5),
    })
    .expect("http client")
}

/// Google client against a mock server with a generous request budget.
pub fn google_client(server_uri: &str, clock: MockClock) -> GoogleCalendarClient {
    google_client_with_budget(server_uri, clock, 100)
}

pub fn google_client_with_budget(
    server_uri: &str,
    clock: MockClock,
    max_requests: u32,
) -> GoogleCalendarClient {
    let limiter_config = RateLimiterConfig::new(max_requests, Duration::from_secs(60));
    let limiter = RateLimiter::new(limiter_config).expect("rate limiter");
    let clock: Arc<dyn Clock> = Arc::new(clock);
    GoogleCalendarClient::new(&google_config(server_uri), http_client(), limiter, clock)
        .expect("google client")
}

/// Enabled configuration with a live access token.
pub fn connected_config(
    selected: &[&str],
    frequency: SyncFrequency,
    now: DateTime<Utc>,
) -> SyncConfiguration {
    let mut config = SyncConfiguration::new(USER, now);
    config.enabled = true;
    config.selected_calendar_ids = selected.iter().map(|id| id.to_string()).collect();
    config.frequency = frequency;
    config.credentials = Some(
        Credentials::new("access-token", Some("refresh-token".into())).with_expiry(now, 3600),
    );
    config
}

pub async fn seed_config(repos: &Repositories, config: &SyncConfiguration) {
    repos.configs.save_settings(config).await.expect("config should be saved");
}

pub fn task(id: &str, title: &str, due: DateTime<Utc>, minutes: Option<i64>) -> Task {
    let fields = TaskFields {
        user_id: USER.into(),
        title: title.into(),
        description: None,
        start_date: None,
        due_date: Some(due),
        estimated_minutes: minutes,
        all_day: false,
        status: TaskStatus::Pending,
        category_id: None,
    };
    Task::from_fields(id, fields, base_time())
}
