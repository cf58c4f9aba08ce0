//! External calendar types
//!
//! Provider-neutral representation of calendars and events as seen through
//! the calendar client adapter.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    EXPORT_WINDOW_AHEAD_MONTHS, EXPORT_WINDOW_BACK_DAYS, IMPORT_WINDOW_AHEAD_MONTHS,
    IMPORT_WINDOW_BACK_MONTHS, ORIGIN_SYSTEM, PROVENANCE_INTERNAL_KEY, PROVENANCE_ORIGIN_KEY,
    PROVENANCE_TASK_ID_KEY,
};

/// Start or end of an event: either an all-day date or an instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTime {
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl EventTime {
    /// Resolve to an instant. All-day dates resolve to midnight UTC.
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            Self::Date(date) => date.and_time(chrono::NaiveTime::MIN).and_utc(),
            Self::DateTime(dt) => *dt,
        }
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }
}

/// Tag identifying events written by this engine
///
/// Stored in the event's private extended properties. It is the only signal
/// that keeps exported events from being imported back as new tasks, so it is
/// parsed strictly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceMarker {
    pub origin: String,
    pub internal: bool,
    pub task_id: Option<String>,
}

impl ProvenanceMarker {
    /// Marker stamped on every event produced from a task.
    pub fn for_task(task_id: impl Into<String>) -> Self {
        Self { origin: ORIGIN_SYSTEM.to_string(), internal: true, task_id: Some(task_id.into()) }
    }

    /// Whether the marker was written by this engine.
    pub fn is_ours(&self) -> bool {
        self.internal && self.origin == ORIGIN_SYSTEM
    }

    pub fn write_into(&self, properties: &mut BTreeMap<String, String>) {
        properties.insert(PROVENANCE_ORIGIN_KEY.to_string(), self.origin.clone());
        properties.insert(PROVENANCE_INTERNAL_KEY.to_string(), self.internal.to_string());
        match &self.task_id {
            Some(task_id) => {
                properties.insert(PROVENANCE_TASK_ID_KEY.to_string(), task_id.clone());
            }
            None => {
                properties.remove(PROVENANCE_TASK_ID_KEY);
            }
        }
    }

    /// Parse the marker out of private extended properties.
    ///
    /// Returns `Ok(None)` when no marker is present and `Err` when a marker is
    /// present but malformed.
    pub fn read_from(properties: &BTreeMap<String, String>) -> Result<Option<Self>, String> {
        let origin = properties.get(PROVENANCE_ORIGIN_KEY);
        let internal = properties.get(PROVENANCE_INTERNAL_KEY);

        match (origin, internal) {
            (None, None) => Ok(None),
            (Some(origin), Some(flag)) => {
                let internal = match flag.trim() {
                    "true" => true,
                    "false" => false,
                    other => return Err(format!("invalid provenance flag '{other}'")),
                };
                if origin.trim().is_empty() {
                    return Err("empty provenance origin".into());
                }
                Ok(Some(Self {
                    origin: origin.trim().to_string(),
                    internal,
                    task_id: properties.get(PROVENANCE_TASK_ID_KEY).cloned(),
                }))
            }
            (Some(_), None) => Err("provenance origin without internal flag".into()),
            (None, Some(_)) => Err("provenance flag without origin".into()),
        }
    }
}

/// Event held in the external calendar service
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExternalEvent {
    /// Provider id; `None` until the event has been created upstream.
    pub id: Option<String>,
    pub calendar_id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
    pub hidden: bool,
    pub deleted: bool,
    /// Private extended properties (provenance lives here).
    pub private_properties: BTreeMap<String, String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ExternalEvent {
    pub fn provenance(&self) -> Result<Option<ProvenanceMarker>, String> {
        ProvenanceMarker::read_from(&self.private_properties)
    }

    /// True only for a well-formed marker written by this engine.
    pub fn is_internal_origin(&self) -> bool {
        matches!(self.provenance(), Ok(Some(marker)) if marker.is_ours())
    }

    pub fn set_provenance(&mut self, marker: &ProvenanceMarker) {
        marker.write_into(&mut self.private_properties);
    }

    /// Resolved `[start, end)` instants, if both ends are present.
    pub fn resolved_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.start?.to_utc(), self.end?.to_utc()))
    }

    pub fn is_all_day(&self) -> bool {
        self.start.is_some_and(|start| start.is_all_day())
    }
}

/// Caller's access level on a calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessRole {
    Owner,
    Writer,
    Reader,
    FreeBusyReader,
}

/// Calendar as returned by the list-calendars call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
    pub id: String,
    pub summary: String,
    pub access_role: AccessRole,
    pub primary: bool,
    pub hidden: bool,
    pub deleted: bool,
}

impl CalendarListEntry {
    /// Calendars that may be selected for sync.
    pub fn is_selectable(&self) -> bool {
        !self.deleted
    }
}

/// Half-open `[start, end)` time window a pass operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Import window: `[now − 1 month, now + 3 months]`.
    pub fn import_window(now: DateTime<Utc>) -> Self {
        Self {
            start: sub_months(now, IMPORT_WINDOW_BACK_MONTHS),
            end: add_months(now, IMPORT_WINDOW_AHEAD_MONTHS),
        }
    }

    /// Export window: `[now − 1 week, now + 1 month]`.
    pub fn export_window(now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::days(EXPORT_WINDOW_BACK_DAYS),
            end: add_months(now, EXPORT_WINDOW_AHEAD_MONTHS),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    /// Whether `[start, end)` intersects the window.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start <= self.end && end >= self.start
    }
}

fn add_months(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_add_months(Months::new(months))
        .unwrap_or_else(|| now + Duration::days(i64::from(months) * 31))
}

fn sub_months(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or_else(|| now - Duration::days(i64::from(months) * 31))
}
