//! Internal task types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CalBridgeError;

/// Lifecycle status of an internal task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = CalBridgeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(CalBridgeError::InvalidInput(format!("unknown task status: {other}"))),
        }
    }
}

/// Task stored in the internal task store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_minutes: Option<i64>,
    /// Dates are whole days; `due_date` is the last day, inclusive.
    pub all_day: bool,
    pub status: TaskStatus,
    pub category_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Build a new task row from mapped fields.
    pub fn from_fields(id: impl Into<String>, fields: TaskFields, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            user_id: fields.user_id,
            title: fields.title,
            description: fields.description,
            start_date: fields.start_date,
            due_date: fields.due_date,
            estimated_minutes: fields.estimated_minutes,
            all_day: fields.all_day,
            status: fields.status,
            category_id: fields.category_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the synced fields with values coming from the calendar.
    ///
    /// Status and category are owned by the task store and are left alone.
    pub fn apply_fields(&mut self, fields: &TaskFields, now: DateTime<Utc>) {
        self.title = fields.title.clone();
        self.description = fields.description.clone();
        self.start_date = fields.start_date;
        self.due_date = fields.due_date;
        self.estimated_minutes = fields.estimated_minutes;
        self.all_day = fields.all_day;
        self.updated_at = now;
    }

    /// Date used to place the task in a sync window (due date first).
    pub fn anchor_date(&self) -> Option<DateTime<Utc>> {
        self.due_date.or(self.start_date)
    }
}

/// Task fields produced by mapping an external event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFields {
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_minutes: Option<i64>,
    pub all_day: bool,
    pub status: TaskStatus,
    pub category_id: Option<String>,
}
