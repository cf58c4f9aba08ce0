//! Shared test helpers for `calbridge-core` integration tests.
//!
//! Fixtures and in-memory port mocks so the sync tests can focus on behaviour
//! instead of wiring.

#![allow(dead_code)]

pub mod calendar;
pub mod repositories;

use std::sync::Arc;

use calbridge_common::time::MockClock;
use calbridge_core::sync::{SyncOrchestrator, SyncPorts};
use calbridge_domain::{
    Credentials, EventTime, ExternalEvent, SyncConfiguration, Task, TaskFields, TaskStatus,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

pub use calendar::{MockCalendarService, MockCatalog};
pub use repositories::{
    MockConfigRepository, MockLogRepository, MockRecordRepository, MockTaskRepository,
};

pub const USER: &str = "user-1";
pub const CALENDAR: &str = "work";

/// Fixed "now" for every sync test.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 14, 9, 0, 0).unwrap()
}

pub fn enabled_config() -> SyncConfiguration {
    let mut config = SyncConfiguration::new(USER, now() - Duration::days(30));
    config.enabled = true;
    config.selected_calendar_ids = vec![CALENDAR.to_string()];
    config.credentials = Some(Credentials::new("access-1", Some("refresh-1".into())));
    config
}

/// Timed event `offset` from now lasting an hour.
pub fn event(id: &str, title: &str, offset: Duration) -> ExternalEvent {
    let start = now() + offset;
    ExternalEvent {
        id: Some(id.to_string()),
        calendar_id: CALENDAR.to_string(),
        summary: Some(title.to_string()),
        start: Some(EventTime::DateTime(start)),
        end: Some(EventTime::DateTime(start + Duration::hours(1))),
        ..ExternalEvent::default()
    }
}

/// Task due `offset` from now.
pub fn task(id: &str, title: &str, offset: Duration) -> Task {
    let fields = TaskFields {
        user_id: USER.to_string(),
        title: title.to_string(),
        description: None,
        start_date: None,
        due_date: Some(now() + offset),
        estimated_minutes: Some(60),
        all_day: false,
        status: TaskStatus::Pending,
        category_id: None,
    };
    Task::from_fields(id, fields, now() - Duration::days(1))
}

/// Orchestrator wired to in-memory mocks, with handles kept for assertions.
pub struct Harness {
    pub tasks: MockTaskRepository,
    pub records: MockRecordRepository,
    pub configs: MockConfigRepository,
    pub logs: MockLogRepository,
    pub calendar: MockCalendarService,
    pub catalog: MockCatalog,
    pub clock: MockClock,
}

impl Harness {
    pub fn new(calendar: MockCalendarService) -> Self {
        Self {
            tasks: MockTaskRepository::default(),
            records: MockRecordRepository::default(),
            configs: MockConfigRepository::default().with_config(enabled_config()),
            logs: MockLogRepository::default(),
            catalog: MockCatalog::new(calendar.clone()),
            calendar,
            clock: MockClock::starting_at(now()),
        }
    }

    pub fn ports(&self) -> SyncPorts {
        SyncPorts {
            tasks: Arc::new(self.tasks.clone()),
            records: Arc::new(self.records.clone()),
            configs: Arc::new(self.configs.clone()),
            logs: Arc::new(self.logs.clone()),
            calendar: Arc::new(self.calendar.clone()),
            catalog: Arc::new(self.catalog.clone()),
        }
    }

    pub fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(self.ports(), Arc::new(self.clock.clone()))
    }

    pub fn config(&self) -> SyncConfiguration {
        self.configs.get(USER).unwrap()
    }
}
