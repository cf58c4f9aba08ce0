//! Google Calendar wire types
//!
//! Request/response bodies of the Calendar v3 API and the OAuth token
//! endpoint, plus their conversion to and from the provider-neutral domain
//! types.

use std::collections::BTreeMap;

use calbridge_domain::{AccessRole, CalendarListEntry, EventTime, ExternalEvent};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

const CANCELLED_STATUS: &str = "cancelled";
const WORKING_LOCATION_TYPE: &str = "workingLocation";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CalendarListResponse {
    #[serde(default)]
    pub items: Vec<GoogleCalendarListEntry>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleCalendarListEntry {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub summary_override: Option<String>,
    pub access_role: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl GoogleCalendarListEntry {
    pub(crate) fn into_domain(self) -> CalendarListEntry {
        let access_role = match self.access_role.as_str() {
            "owner" => AccessRole::Owner,
            "writer" => AccessRole::Writer,
            "reader" => AccessRole::Reader,
            _ => AccessRole::FreeBusyReader,
        };
        CalendarListEntry {
            summary: self.summary_override.or(self.summary).unwrap_or_else(|| self.id.clone()),
            id: self.id,
            access_role,
            primary: self.primary,
            hidden: self.hidden,
            deleted: self.deleted,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventsResponse {
    #[serde(default)]
    pub items: Vec<GoogleEvent>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing)]
    pub status: Option<String>,
    #[serde(default, skip_serializing)]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<GoogleEventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<GoogleEventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_properties: Option<ExtendedProperties>,
    #[serde(default, skip_serializing)]
    pub updated: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleEventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct ExtendedProperties {
    #[serde(default)]
    pub private: BTreeMap<String, String>,
}

impl GoogleEventTime {
    fn from_domain(time: &EventTime) -> Self {
        match time {
            EventTime::Date(date) => {
                Self { date: Some(date.format("%Y-%m-%d").to_string()), date_time: None }
            }
            EventTime::DateTime(instant) => Self { date: None, date_time: Some(instant.to_rfc3339()) },
        }
    }

    /// `None` when neither field parses; the event is then treated as undated.
    fn to_domain(&self, event_id: &str) -> Option<EventTime> {
        if let Some(raw) = &self.date_time {
            return match DateTime::parse_from_rfc3339(raw) {
                Ok(instant) => Some(EventTime::DateTime(instant.with_timezone(&Utc))),
                Err(e) => {
                    warn!(event_id, error = %e, "Unparseable event dateTime");
                    None
                }
            };
        }
        let raw = self.date.as_deref()?;
        match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => Some(EventTime::Date(date)),
            Err(e) => {
                warn!(event_id, error = %e, "Unparseable event date");
                None
            }
        }
    }
}

impl GoogleEvent {
    /// Request body for create and patch. The provenance marker is
    /// written on every call.
    pub(crate) fn from_domain(event: &ExternalEvent) -> Self {
        Self {
            id: None,
            status: None,
            event_type: None,
            summary: event.summary.clone(),
            description: event.description.clone(),
            start: event.start.as_ref().map(GoogleEventTime::from_domain),
            end: event.end.as_ref().map(GoogleEventTime::from_domain),
            extended_properties: (!event.private_properties.is_empty())
                .then(|| ExtendedProperties { private: event.private_properties.clone() }),
            updated: None,
        }
    }

    pub(crate) fn into_domain(self, calendar_id: &str) -> ExternalEvent {
        let event_id = self.id.clone().unwrap_or_default();
        let start = self.start.as_ref().and_then(|time| time.to_domain(&event_id));
        let end = self.end.as_ref().and_then(|time| time.to_domain(&event_id));
        let updated_at = self
            .updated
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|instant| instant.with_timezone(&Utc));

        ExternalEvent {
            id: self.id,
            calendar_id: calendar_id.to_string(),
            summary: self.summary,
            description: self.description,
            start,
            end,
            hidden: self.event_type.as_deref() == Some(WORKING_LOCATION_TYPE),
            deleted: self.status.as_deref() == Some(CANCELLED_STATUS),
            private_properties: self.extended_properties.map(|props| props.private).unwrap_or_default(),
            updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenRefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn timed_event_converts_offsets_to_utc() {
        let wire: GoogleEvent = serde_json::from_value(json!({
            "id": "evt-1",
            "status": "confirmed",
            "summary": "Standup",
            "start": {"dateTime": "2025-05-14T10:00:00+02:00"},
            "end": {"dateTime": "2025-05-14T10:15:00+02:00"},
            "extendedProperties": {"private": {"calbridge_origin": "calbridge"}}
        }))
        .unwrap();

        let event = wire.into_domain("work");
        assert_eq!(event.calendar_id, "work");
        assert_eq!(
            event.start,
            Some(EventTime::DateTime(Utc.with_ymd_and_hms(2025, 5, 14, 8, 0, 0).unwrap()))
        );
        assert!(!event.deleted);
        assert_eq!(event.private_properties.get("calbridge_origin").unwrap(), "calbridge");
    }

    #[test]
    fn cancelled_and_working_location_events_are_flagged() {
        let cancelled: GoogleEvent =
            serde_json::from_value(json!({"id": "a", "status": "cancelled"})).unwrap();
        assert!(cancelled.into_domain("work").deleted);

        let location: GoogleEvent = serde_json::from_value(json!({
            "id": "b",
            "eventType": "workingLocation",
            "start": {"date": "2025-05-14"},
            "end": {"date": "2025-05-15"}
        }))
        .unwrap();
        let event = location.into_domain("work");
        assert!(event.hidden);
        assert!(event.is_all_day());
    }

    #[test]
    fn malformed_times_become_undated() {
        let wire: GoogleEvent = serde_json::from_value(json!({
            "id": "c",
            "start": {"dateTime": "tomorrow-ish"},
            "end": {"date": "2025-13-40"}
        }))
        .unwrap();
        let event = wire.into_domain("work");
        assert!(event.start.is_none());
        assert!(event.end.is_none());
    }

    #[test]
    fn request_body_omits_read_only_fields() {
        let mut event = ExternalEvent {
            id: Some("evt-1".into()),
            calendar_id: "work".into(),
            summary: Some("Plan".into()),
            start: Some(EventTime::Date(NaiveDate::from_ymd_opt(2025, 5, 14).unwrap())),
            end: Some(EventTime::Date(NaiveDate::from_ymd_opt(2025, 5, 15).unwrap())),
            ..ExternalEvent::default()
        };
        event.private_properties.insert("calbridge_internal".into(), "true".into());

        let body = serde_json::to_value(GoogleEvent::from_domain(&event)).unwrap();
        assert_eq!(body["start"], json!({"date": "2025-05-14"}));
        assert_eq!(body["extendedProperties"]["private"]["calbridge_internal"], "true");
        assert!(body.get("id").is_none());
        assert!(body.get("status").is_none());
        assert!(body.get("description").is_none());
    }

    #[test]
    fn calendar_entries_prefer_summary_override() {
        let entry: GoogleCalendarListEntry = serde_json::from_value(json!({
            "id": "team@group.calendar.google.com",
            "summary": "Team",
            "summaryOverride": "My Team",
            "accessRole": "writer"
        }))
        .unwrap();
        let entry = entry.into_domain();
        assert_eq!(entry.summary, "My Team");
        assert_eq!(entry.access_role, AccessRole::Writer);
        assert!(!entry.primary);
    }
}
