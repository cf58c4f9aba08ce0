//! Event–task mapper
//!
//! Pure transforms between external events and internal tasks. Every event
//! produced from a task carries the provenance marker; it is the only thing
//! that stops an exported event from being imported back as a new task.

use calbridge_domain::constants::{DEFAULT_TASK_DURATION_MINUTES, UNTITLED_EVENT_TITLE};
use calbridge_domain::{
    CalBridgeError, EventTime, ExternalEvent, ProvenanceMarker, Result, Task, TaskFields,
    TaskStatus,
};
use chrono::Duration;

/// Map a task onto an event in `calendar_id`.
///
/// The event starts at the task's start date, or `estimated_minutes` before
/// its due date when undated. It ends at the due date when that lies after
/// the start, otherwise after the estimated duration. All-day tasks become
/// date-only events whose exclusive end is the day after the due date.
///
/// # Errors
/// `InvalidInput` when the task has neither a start nor a due date.
pub fn task_to_event(task: &Task, calendar_id: &str) -> Result<ExternalEvent> {
    if task.all_day {
        return all_day_event(task, calendar_id);
    }

    let duration = Duration::minutes(
        task.estimated_minutes.filter(|minutes| *minutes > 0).unwrap_or(DEFAULT_TASK_DURATION_MINUTES),
    );

    let start = match (task.start_date, task.due_date) {
        (Some(start), _) => start,
        (None, Some(due)) => due - duration,
        (None, None) => {
            return Err(CalBridgeError::InvalidInput(format!(
                "task {} has no start or due date",
                task.id
            )))
        }
    };
    let end = task.due_date.filter(|due| *due > start).unwrap_or(start + duration);

    Ok(stamped_event(task, calendar_id, EventTime::DateTime(start), EventTime::DateTime(end)))
}

fn all_day_event(task: &Task, calendar_id: &str) -> Result<ExternalEvent> {
    let first = task.start_date.or(task.due_date).map(|at| at.date_naive()).ok_or_else(|| {
        CalBridgeError::InvalidInput(format!("task {} has no start or due date", task.id))
    })?;
    let last = task.due_date.map(|at| at.date_naive()).filter(|day| *day >= first).unwrap_or(first);
    let end = last.succ_opt().ok_or_else(|| {
        CalBridgeError::InvalidInput(format!("task {} ends at the end of the calendar", task.id))
    })?;

    Ok(stamped_event(task, calendar_id, EventTime::Date(first), EventTime::Date(end)))
}

fn stamped_event(task: &Task, calendar_id: &str, start: EventTime, end: EventTime) -> ExternalEvent {
    let mut event = ExternalEvent {
        id: None,
        calendar_id: calendar_id.to_string(),
        summary: Some(task.title.clone()),
        description: task.description.clone(),
        start: Some(start),
        end: Some(end),
        ..ExternalEvent::default()
    };
    event.set_provenance(&ProvenanceMarker::for_task(&task.id));
    event
}

/// Map an external event onto task fields for `user_id`.
///
/// Missing titles fall back to a placeholder. All-day events use an exclusive
/// end date upstream, so the due date is pulled back onto the last day and no
/// duration estimate is derived.
///
/// # Errors
/// `InvalidInput` when the event has no resolvable span or ends before it starts.
pub fn event_to_task(event: &ExternalEvent, user_id: &str) -> Result<TaskFields> {
    let (start, end) = event.resolved_span().ok_or_else(|| {
        CalBridgeError::InvalidInput(format!("event {} has no start/end", event_label(event)))
    })?;
    if end < start {
        return Err(CalBridgeError::InvalidInput(format!(
            "event {} ends before it starts",
            event_label(event)
        )));
    }

    let title = event
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|summary| !summary.is_empty())
        .unwrap_or(UNTITLED_EVENT_TITLE)
        .to_string();

    let (due_date, estimated_minutes) = if event.is_all_day() {
        let last_day = end - Duration::days(1);
        (Some(last_day.max(start)), None)
    } else {
        let minutes = (end - start).num_minutes();
        (Some(end), (minutes > 0).then_some(minutes))
    };

    Ok(TaskFields {
        user_id: user_id.to_string(),
        title,
        description: event.description.clone(),
        start_date: Some(start),
        due_date,
        estimated_minutes,
        all_day: event.is_all_day(),
        status: TaskStatus::Pending,
        category_id: None,
    })
}

/// Whether an event must be skipped before mapping.
pub fn should_exclude(event: &ExternalEvent) -> bool {
    event.hidden || event.deleted || event.resolved_span().is_none()
}

fn event_label(event: &ExternalEvent) -> &str {
    event.id.as_deref().unwrap_or("<unsaved>")
}
