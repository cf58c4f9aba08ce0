//! Tests for the guarded trigger entry point.

mod support;

use std::sync::Arc;

use calbridge_core::sync::{RunRejection, SyncTrigger};
use calbridge_domain::{SyncDirection, SyncRequest};
use chrono::Duration;
use support::{event, Harness, MockCalendarService, CALENDAR, USER};

fn trigger(harness: &Harness) -> SyncTrigger {
    SyncTrigger::new(
        Arc::new(harness.configs.clone()),
        Arc::new(harness.logs.clone()),
        Arc::new(harness.orchestrator()),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn started_run_returns_response_contract() {
    let calendar = MockCalendarService::default()
        .with_events(CALENDAR, vec![event("evt-1", "One", Duration::days(1))]);
    let harness = Harness::new(calendar);

    let request = SyncRequest { direction: SyncDirection::Import, ..SyncRequest::default() };
    let response = trigger(&harness).trigger(Some(USER), request).await.unwrap();

    assert!(response.success);
    assert!(!response.dry_run);
    assert_eq!(response.result.created, 1);
    assert_eq!(harness.logs.entries()[0].id, response.sync_id);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_run_still_returns_a_result() {
    let calendar = MockCalendarService::default();
    calendar.fail_listing();
    let harness = Harness::new(calendar);

    let response = trigger(&harness).trigger(Some(USER), SyncRequest::default()).await.unwrap();

    assert!(!response.success);
    assert_eq!(response.result.errors.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejects_missing_identity_and_configuration() {
    let harness = Harness::new(MockCalendarService::default());
    let trigger = trigger(&harness);

    assert!(matches!(
        trigger.trigger(None, SyncRequest::default()).await,
        Err(RunRejection::Unauthenticated)
    ));
    assert!(matches!(
        trigger.trigger(Some("  "), SyncRequest::default()).await,
        Err(RunRejection::Unauthenticated)
    ));
    assert!(matches!(
        trigger.trigger(Some("stranger"), SyncRequest::default()).await,
        Err(RunRejection::NotConfigured)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn recent_logs_are_scoped_to_caller() {
    let harness = Harness::new(MockCalendarService::default());
    let trigger = trigger(&harness);
    trigger.trigger(Some(USER), SyncRequest::default()).await.unwrap();
    trigger.trigger(Some(USER), SyncRequest::default()).await.unwrap();

    assert_eq!(trigger.recent_logs(Some(USER), 10).await.unwrap().len(), 2);
    assert_eq!(trigger.recent_logs(Some(USER), 1).await.unwrap().len(), 1);
    assert!(trigger.recent_logs(Some("other"), 10).await.unwrap().is_empty());
    assert!(matches!(trigger.recent_logs(None, 10).await, Err(RunRejection::Unauthenticated)));
}
