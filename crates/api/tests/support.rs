//! Shared fixtures for route tests: a temporary database, an in-memory
//! calendar service and a router over a scheduler-less context.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use calbridge_api::{router, AppContext};
use calbridge_common::time::{Clock, SystemClock};
use calbridge_core::calendar::{CalendarAccess, CalendarService};
use calbridge_domain::{
    AccessRole, CalBridgeError, CalendarListEntry, Config, Credentials, ExternalEvent, Result,
    TimeWindow,
};
use calbridge_infra::DbManager;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const USER: &str = "user-1";

/// Calendar id whose event listing always fails upstream.
pub const BROKEN_CALENDAR: &str = "broken";

/// In-memory calendar service with a fixed calendar list and no events.
#[derive(Default)]
pub struct FakeCalendar {
    pub list_calls: AtomicUsize,
    pub writes: AtomicUsize,
}

impl FakeCalendar {
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

fn entry(id: &str, primary: bool) -> CalendarListEntry {
    CalendarListEntry {
        id: id.to_string(),
        summary: id.to_uppercase(),
        access_role: AccessRole::Owner,
        primary,
        hidden: false,
        deleted: false,
    }
}

#[async_trait]
impl CalendarService for FakeCalendar {
    async fn verify(&self, access: &CalendarAccess) -> Result<bool> {
        Ok(access.access_token != "revoked")
    }

    async fn refresh(&self, _user_id: &str, _refresh_token: &str) -> Result<Credentials> {
        Err(CalBridgeError::Auth("refresh rejected".into()))
    }

    async fn list_calendars(&self, _access: &CalendarAccess) -> Result<Vec<CalendarListEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![entry("me", true), entry("work", false), entry(BROKEN_CALENDAR, false)])
    }

    async fn list_events(
        &self,
        _access: &CalendarAccess,
        calendar_id: &str,
        _window: &TimeWindow,
    ) -> Result<Vec<ExternalEvent>> {
        if calendar_id == BROKEN_CALENDAR {
            return Err(CalBridgeError::Network("upstream unavailable".into()));
        }
        Ok(Vec::new())
    }

    async fn create_event(
        &self,
        _access: &CalendarAccess,
        _calendar_id: &str,
        event: &ExternalEvent,
    ) -> Result<ExternalEvent> {
        let n = self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(ExternalEvent { id: Some(format!("created-{n}")), ..event.clone() })
    }

    async fn update_event(
        &self,
        _access: &CalendarAccess,
        _calendar_id: &str,
        event_id: &str,
        event: &ExternalEvent,
    ) -> Result<ExternalEvent> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(ExternalEvent { id: Some(event_id.to_string()), ..event.clone() })
    }
}

/// Router plus the pieces tests inspect directly.
pub struct TestApp {
    pub ctx: Arc<AppContext>,
    pub calendar: Arc<FakeCalendar>,
    router: Router,
    _temp_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("calbridge-api-test.db");

        let db = Arc::new(DbManager::new(&db_path, 4).expect("db manager should be created"));
        db.run_migrations().expect("schema migrations should apply");

        let mut config = Config::default();
        config.database.path = db_path.to_string_lossy().into_owned();
        config.scheduler.enabled = false;

        let calendar = Arc::new(FakeCalendar::default());
        let service: Arc<dyn CalendarService> = calendar.clone();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ctx = Arc::new(AppContext::with_calendar(config, db, service, clock));

        Self { router: router(Arc::clone(&ctx)), ctx, calendar, _temp_dir: temp_dir }
    }

    /// Send a request and decode the JSON response body.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = body.map(|value| value.to_string()).unwrap_or_default();
        self.send_raw(method, uri, user, body).await
    }

    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        user: Option<&str>,
        body: String,
    ) -> (StatusCode, Value) {
        let mut builder =
            Request::builder().method(method).uri(uri).header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        let request = builder.body(Body::from(body)).expect("request should build");

        let response =
            self.router.clone().oneshot(request).await.expect("router should not fail");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response should be JSON")
        };
        (status, json)
    }

    /// Connect the test user and select calendars.
    pub async fn connect(&self, calendar_ids: &[&str]) {
        let (status, _) = self
            .send(
                Method::POST,
                "/api/sync/connection",
                Some(USER),
                Some(serde_json::json!({"access_token": "access", "refresh_token": "refresh", "expires_in": 3600})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = self
            .send(
                Method::PUT,
                "/api/sync/settings",
                Some(USER),
                Some(serde_json::json!({"calendar_ids": calendar_ids})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "settings update failed: {body}");
    }
}
