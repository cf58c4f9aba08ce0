//! Port interfaces for the external calendar service
//!
//! The adapter is a thin protocol wrapper; it does not know about tasks, the
//! ledger, or sync windows beyond the range it is asked to list.

use std::fmt;

use async_trait::async_trait;
use calbridge_domain::{CalendarListEntry, Credentials, ExternalEvent, Result, TimeWindow};

/// Caller identity and bearer token for one upstream call
///
/// The user id doubles as the rate-limit identifier.
#[derive(Clone, PartialEq, Eq)]
pub struct CalendarAccess {
    pub user_id: String,
    pub access_token: String,
}

impl CalendarAccess {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), access_token: access_token.into() }
    }

    pub fn from_credentials(user_id: &str, credentials: &Credentials) -> Self {
        Self::new(user_id, credentials.access_token.clone())
    }
}

impl fmt::Debug for CalendarAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarAccess")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Trait for external calendar operations
#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Lightweight authenticated probe; `Ok(false)` means the token was rejected.
    async fn verify(&self, access: &CalendarAccess) -> Result<bool>;

    /// Exchange a refresh token for a new token set
    async fn refresh(&self, user_id: &str, refresh_token: &str) -> Result<Credentials>;

    /// List the calendars visible to the user
    async fn list_calendars(&self, access: &CalendarAccess) -> Result<Vec<CalendarListEntry>>;

    /// List events of one calendar overlapping `window`
    async fn list_events(
        &self,
        access: &CalendarAccess,
        calendar_id: &str,
        window: &TimeWindow,
    ) -> Result<Vec<ExternalEvent>>;

    /// Create an event, returning it with its upstream id
    async fn create_event(
        &self,
        access: &CalendarAccess,
        calendar_id: &str,
        event: &ExternalEvent,
    ) -> Result<ExternalEvent>;

    /// Replace an existing event
    async fn update_event(
        &self,
        access: &CalendarAccess,
        calendar_id: &str,
        event_id: &str,
        event: &ExternalEvent,
    ) -> Result<ExternalEvent>;
}

/// Read-through view of a user's calendar list
#[async_trait]
pub trait CalendarCatalog: Send + Sync {
    /// Calendars for the user, served from cache when fresh
    async fn calendars(&self, access: &CalendarAccess) -> Result<Vec<CalendarListEntry>>;

    /// Drop the cached list for a user
    async fn invalidate(&self, user_id: &str);
}
