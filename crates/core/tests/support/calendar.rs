//! In-memory calendar service and calendar list cache

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use calbridge_core::calendar::{CalendarAccess, CalendarCatalog, CalendarService};
use calbridge_domain::{
    AccessRole, CalBridgeError, CalendarListEntry, Credentials, ExternalEvent,
    Result as DomainResult, TimeWindow,
};
use parking_lot::Mutex;

/// Fake upstream calendar.
///
/// Events live per calendar in upstream listing order. Created events get
/// sequential ids (`created-1`, `created-2`, ...). Every call is counted so
/// tests can assert that dry runs never reach a mutating endpoint.
#[derive(Clone)]
pub struct MockCalendarService {
    events: Arc<Mutex<BTreeMap<String, Vec<ExternalEvent>>>>,
    calendars: Arc<Mutex<Vec<CalendarListEntry>>>,
    token_valid: Arc<Mutex<bool>>,
    refresh_result: Arc<Mutex<Option<Credentials>>>,
    failing_updates: Arc<Mutex<HashSet<String>>>,
    fail_listing: Arc<Mutex<bool>>,
    fail_creates: Arc<Mutex<bool>>,
    next_id: Arc<AtomicUsize>,
    pub verify_calls: Arc<AtomicUsize>,
    pub refresh_calls: Arc<AtomicUsize>,
    pub list_calendar_calls: Arc<AtomicUsize>,
    pub create_calls: Arc<AtomicUsize>,
    pub update_calls: Arc<AtomicUsize>,
}

impl Default for MockCalendarService {
    fn default() -> Self {
        Self {
            events: Arc::default(),
            calendars: Arc::new(Mutex::new(vec![calendar("primary-cal", true)])),
            token_valid: Arc::new(Mutex::new(true)),
            refresh_result: Arc::default(),
            failing_updates: Arc::default(),
            fail_listing: Arc::default(),
            fail_creates: Arc::default(),
            next_id: Arc::new(AtomicUsize::new(1)),
            verify_calls: Arc::default(),
            refresh_calls: Arc::default(),
            list_calendar_calls: Arc::default(),
            create_calls: Arc::default(),
            update_calls: Arc::default(),
        }
    }
}

pub fn calendar(id: &str, primary: bool) -> CalendarListEntry {
    CalendarListEntry {
        id: id.to_string(),
        summary: id.to_string(),
        access_role: AccessRole::Owner,
        primary,
        hidden: false,
        deleted: false,
    }
}

impl MockCalendarService {
    pub fn with_events(self, calendar_id: &str, events: Vec<ExternalEvent>) -> Self {
        self.events.lock().insert(calendar_id.to_string(), events);
        self
    }

    pub fn with_calendars(self, calendars: Vec<CalendarListEntry>) -> Self {
        *self.calendars.lock() = calendars;
        self
    }

    /// Reject the access token on probe; `refreshed` is what a refresh returns.
    pub fn with_expired_token(self, refreshed: Option<Credentials>) -> Self {
        *self.token_valid.lock() = false;
        *self.refresh_result.lock() = refreshed;
        self
    }

    pub fn fail_update_of(&self, event_id: &str) {
        self.failing_updates.lock().insert(event_id.to_string());
    }

    pub fn fail_listing(&self) {
        *self.fail_listing.lock() = true;
    }

    pub fn fail_creates(&self) {
        *self.fail_creates.lock() = true;
    }

    /// Delete an event upstream without telling anyone.
    pub fn remove_event(&self, event_id: &str) {
        for events in self.events.lock().values_mut() {
            events.retain(|event| event.id.as_deref() != Some(event_id));
        }
    }

    pub fn events(&self, calendar_id: &str) -> Vec<ExternalEvent> {
        self.events.lock().get(calendar_id).cloned().unwrap_or_default()
    }

    pub fn mutation_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst) + self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarService for MockCalendarService {
    async fn verify(&self, access: &CalendarAccess) -> DomainResult<bool> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.token_valid.lock() && !access.access_token.is_empty())
    }

    async fn refresh(&self, _user_id: &str, _refresh_token: &str) -> DomainResult<Credentials> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_result
            .lock()
            .clone()
            .ok_or_else(|| CalBridgeError::Auth("invalid_grant".into()))
    }

    async fn list_calendars(&self, _access: &CalendarAccess) -> DomainResult<Vec<CalendarListEntry>> {
        self.list_calendar_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.calendars.lock().clone())
    }

    async fn list_events(
        &self,
        _access: &CalendarAccess,
        calendar_id: &str,
        _window: &TimeWindow,
    ) -> DomainResult<Vec<ExternalEvent>> {
        if *self.fail_listing.lock() {
            return Err(CalBridgeError::Network("listing unavailable".into()));
        }
        Ok(self.events(calendar_id))
    }

    async fn create_event(
        &self,
        _access: &CalendarAccess,
        calendar_id: &str,
        event: &ExternalEvent,
    ) -> DomainResult<ExternalEvent> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_creates.lock() {
            return Err(CalBridgeError::Network("create unavailable".into()));
        }
        let mut created = event.clone();
        created.id = Some(format!("created-{}", self.next_id.fetch_add(1, Ordering::SeqCst)));
        created.calendar_id = calendar_id.to_string();
        self.events.lock().entry(calendar_id.to_string()).or_default().push(created.clone());
        Ok(created)
    }

    async fn update_event(
        &self,
        _access: &CalendarAccess,
        calendar_id: &str,
        event_id: &str,
        event: &ExternalEvent,
    ) -> DomainResult<ExternalEvent> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_updates.lock().contains(event_id) {
            return Err(CalBridgeError::NotFound(format!("event {event_id}")));
        }
        let mut events = self.events.lock();
        let stored = events
            .get_mut(calendar_id)
            .and_then(|events| events.iter_mut().find(|e| e.id.as_deref() == Some(event_id)))
            .ok_or_else(|| CalBridgeError::NotFound(format!("event {event_id}")))?;
        let mut updated = event.clone();
        updated.id = Some(event_id.to_string());
        updated.calendar_id = calendar_id.to_string();
        *stored = updated.clone();
        Ok(updated)
    }
}

/// Pass-through catalog that records invalidations.
#[derive(Clone)]
pub struct MockCatalog {
    calendar: MockCalendarService,
    pub invalidated: Arc<Mutex<Vec<String>>>,
}

impl MockCatalog {
    pub fn new(calendar: MockCalendarService) -> Self {
        Self { calendar, invalidated: Arc::default() }
    }
}

#[async_trait]
impl CalendarCatalog for MockCatalog {
    async fn calendars(&self, access: &CalendarAccess) -> DomainResult<Vec<CalendarListEntry>> {
        self.calendar.list_calendars(access).await
    }

    async fn invalidate(&self, user_id: &str) {
        self.invalidated.lock().push(user_id.to_string());
    }
}
