//! Sync trigger and run log routes

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use calbridge_domain::{SyncLogEntry, SyncRequest, TriggerResponse};
use serde::Deserialize;

use super::{caller, parse_body, ApiError};
use crate::context::AppContext;

/// Page size when the caller does not ask for one
pub const DEFAULT_LOG_LIMIT: usize = 20;

pub fn router() -> Router<Arc<AppContext>> {
    Router::new().route("/api/sync", post(trigger_sync)).route("/api/sync/logs", get(sync_logs))
}

/// `POST /api/sync`
///
/// A run that finished with errors still answers 200 with `success: false`;
/// only rejected runs map to an error status.
async fn trigger_sync(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TriggerResponse>, ApiError> {
    let user_id = caller(&headers).ok_or_else(ApiError::unauthenticated)?;
    let request: SyncRequest = parse_body(&body)?;

    let response = ctx.trigger.trigger(Some(user_id), request).await?;
    Ok(Json(response))
}

#[derive(Debug, Default, Deserialize)]
struct LogQuery {
    limit: Option<usize>,
}

/// `GET /api/sync/logs?limit=N`
async fn sync_logs(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<SyncLogEntry>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    let logs = ctx.trigger.recent_logs(caller(&headers), limit).await?;
    Ok(Json(logs))
}
