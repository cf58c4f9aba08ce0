//! Google Calendar adapter
//!
//! Implements [`CalendarService`] over the Calendar v3 REST API. Every
//! upstream request first takes a token from the per-user rate limiter;
//! a rejection fails the call with `RateLimited` and is not retried.
//! Reads go through the retrying HTTP client, writes are sent once.
//! Updates are PATCHes so fields the mapping does not carry keep their
//! upstream values.

use std::sync::Arc;

use async_trait::async_trait;
use calbridge_common::resilience::RateLimiter;
use calbridge_common::time::Clock;
use calbridge_core::calendar::{CalendarAccess, CalendarService};
use calbridge_domain::{
    CalBridgeError, CalendarListEntry, Credentials, ExternalEvent, GoogleConfig, Result,
    TimeWindow,
};
use chrono::SecondsFormat;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use super::types::{CalendarListResponse, EventsResponse, GoogleEvent, TokenRefreshResponse};
use crate::errors::{status_error, InfraError};
use crate::http::HttpClient;

const PAGE_SIZE: &str = "250";
const MAX_PAGES: usize = 40;

/// Google Calendar client
pub struct GoogleCalendarClient {
    http: HttpClient,
    api_base: String,
    token_endpoint: String,
    client_id: String,
    client_secret: String,
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
}

impl GoogleCalendarClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    /// `Config` when the API base or token endpoint is not an absolute URL.
    pub fn new(
        config: &GoogleConfig,
        http: HttpClient,
        limiter: RateLimiter,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let api_base = validate_url("google.api_base", &config.api_base)?;
        let token_endpoint = validate_url("google.token_endpoint", &config.token_endpoint)?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token_endpoint,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            limiter,
            clock,
        })
    }

    fn acquire(&self, user_id: &str) -> Result<()> {
        self.limiter.try_acquire(user_id).map_err(|rejected| {
            warn!(user_id, retry_after_ms = rejected.retry_after.as_millis() as u64, "Upstream rate limit hit");
            CalBridgeError::RateLimited(format!(
                "calendar request budget exhausted, retry after {}s",
                rejected.retry_after.as_secs().max(1)
            ))
        })
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!("{}/calendars/{}/events", self.api_base, urlencoding::encode(calendar_id))
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        format!("{}/{}", self.events_url(calendar_id), urlencoding::encode(event_id))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        access: &CalendarAccess,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.acquire(&access.user_id)?;
        let builder =
            self.http.request(Method::GET, url).bearer_auth(&access.access_token).query(query);
        let response = self.http.send(builder).await?;
        decode(ensure_success(response)?).await
    }
}

#[async_trait]
impl CalendarService for GoogleCalendarClient {
    #[instrument(skip(self, access), fields(user_id = %access.user_id))]
    async fn verify(&self, access: &CalendarAccess) -> Result<bool> {
        self.acquire(&access.user_id)?;
        let url = format!("{}/users/me/calendarList", self.api_base);
        let builder = self
            .http
            .request(Method::GET, url)
            .bearer_auth(&access.access_token)
            .query(&[("maxResults", "1")]);

        let response = self.http.send(builder).await?;
        match response.status() {
            StatusCode::UNAUTHORIZED => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(status_error(status.as_u16(), status.canonical_reason())),
        }
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh(&self, user_id: &str, refresh_token: &str) -> Result<Credentials> {
        self.acquire(user_id)?;
        let builder = self.http.request(Method::POST, &self.token_endpoint).form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ]);

        let response = self.http.send_once(builder).await.map_err(|e| {
            CalBridgeError::Auth(format!("token refresh request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CalBridgeError::Auth(format!(
                "token refresh rejected (HTTP {})",
                status.as_u16()
            )));
        }

        let body: TokenRefreshResponse = decode(response).await.map_err(|e| {
            CalBridgeError::Auth(format!("failed to parse token response: {e}"))
        })?;

        let credentials = Credentials::new(body.access_token, body.refresh_token);
        Ok(match body.expires_in {
            Some(expires_in) => credentials.with_expiry(self.clock.utc_now(), expires_in),
            None => credentials,
        })
    }

    #[instrument(skip(self, access), fields(user_id = %access.user_id))]
    async fn list_calendars(&self, access: &CalendarAccess) -> Result<Vec<CalendarListEntry>> {
        let url = format!("{}/users/me/calendarList", self.api_base);
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut query = vec![("maxResults", PAGE_SIZE.to_string()), ("showHidden", "true".into())];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let page: CalendarListResponse = self.get_json(access, &url, &query).await?;
            calendars.extend(page.items.into_iter().map(|entry| entry.into_domain()));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        if page_token.is_some() {
            warn!(
                count = calendars.len(),
                max_pages = MAX_PAGES,
                "Calendar list truncated at page cap"
            );
        }
        debug!(count = calendars.len(), "Listed calendars");
        Ok(calendars)
    }

    #[instrument(skip(self, access, window), fields(user_id = %access.user_id))]
    async fn list_events(
        &self,
        access: &CalendarAccess,
        calendar_id: &str,
        window: &TimeWindow,
    ) -> Result<Vec<ExternalEvent>> {
        let url = self.events_url(calendar_id);
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut query = vec![
                ("timeMin", window.start.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("timeMax", window.end.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("singleEvents", "true".to_string()),
                ("maxResults", PAGE_SIZE.to_string()),
            ];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let page: EventsResponse = self.get_json(access, &url, &query).await?;
            events.extend(page.items.into_iter().map(|event| event.into_domain(calendar_id)));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        if page_token.is_some() {
            warn!(
                calendar_id,
                count = events.len(),
                max_pages = MAX_PAGES,
                "Event listing truncated at page cap"
            );
        }
        debug!(count = events.len(), "Listed events");
        Ok(events)
    }

    #[instrument(skip(self, access, event), fields(user_id = %access.user_id))]
    async fn create_event(
        &self,
        access: &CalendarAccess,
        calendar_id: &str,
        event: &ExternalEvent,
    ) -> Result<ExternalEvent> {
        self.acquire(&access.user_id)?;
        let builder = self
            .http
            .request(Method::POST, self.events_url(calendar_id))
            .bearer_auth(&access.access_token)
            .json(&GoogleEvent::from_domain(event));

        let response = self.http.send_once(builder).await?;
        let created: GoogleEvent = decode(ensure_success(response)?).await?;
        Ok(created.into_domain(calendar_id))
    }

    #[instrument(skip(self, access, event), fields(user_id = %access.user_id))]
    async fn update_event(
        &self,
        access: &CalendarAccess,
        calendar_id: &str,
        event_id: &str,
        event: &ExternalEvent,
    ) -> Result<ExternalEvent> {
        self.acquire(&access.user_id)?;
        let builder = self
            .http
            .request(Method::PATCH, self.event_url(calendar_id, event_id))
            .bearer_auth(&access.access_token)
            .json(&GoogleEvent::from_domain(event));

        let response = self.http.send_once(builder).await?;
        let updated: GoogleEvent = decode(ensure_success(response)?).await?;
        Ok(updated.into_domain(calendar_id))
    }
}

fn validate_url(field: &str, value: &str) -> Result<String> {
    let parsed = Url::parse(value)
        .map_err(|e| CalBridgeError::Config(format!("{field} is not a valid URL: {e}")))?;
    if parsed.cannot_be_a_base() {
        return Err(CalBridgeError::Config(format!("{field} must be an absolute URL")));
    }
    Ok(value.to_string())
}

fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(status_error(status.as_u16(), status.canonical_reason()))
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await.map_err(|e| CalBridgeError::from(InfraError::from(e)))?;
    serde_json::from_slice(&bytes).map_err(|e| CalBridgeError::from(InfraError::from(e)))
}
