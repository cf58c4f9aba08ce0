//! Account connection and calendar selection routes

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use calbridge_core::sync::SelectionUpdate;
use calbridge_domain::{
    CalendarListEntry, Credentials, SyncConfiguration, SyncDirection, SyncFrequency,
};
use chrono::Utc;
use serde::Deserialize;

use super::{caller, ApiError};
use crate::context::AppContext;

pub fn router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/api/sync/connection", post(connect).delete(disconnect))
        .route("/api/sync/settings", put(update_settings))
        .route("/api/calendars", get(list_calendars))
}

#[derive(Debug, Deserialize)]
struct ConnectBody {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Lifetime of the access token in seconds
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SettingsBody {
    #[serde(default, alias = "calendarIds")]
    calendar_ids: Vec<String>,
    #[serde(default)]
    direction: Option<SyncDirection>,
    #[serde(default)]
    frequency: Option<SyncFrequency>,
}

fn require_caller(headers: &HeaderMap) -> Result<&str, ApiError> {
    caller(headers).ok_or_else(ApiError::unauthenticated)
}

async fn connect(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(body): Json<ConnectBody>,
) -> Result<Json<SyncConfiguration>, ApiError> {
    let user_id = require_caller(&headers)?;

    let mut credentials = Credentials::new(body.access_token, body.refresh_token);
    if let Some(expires_in) = body.expires_in {
        credentials = credentials.with_expiry(Utc::now(), expires_in);
    }

    Ok(Json(ctx.settings.connect(user_id, credentials).await?))
}

async fn disconnect(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Json<SyncConfiguration>, ApiError> {
    let user_id = require_caller(&headers)?;
    Ok(Json(ctx.settings.disconnect(user_id).await?))
}

async fn update_settings(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(body): Json<SettingsBody>,
) -> Result<Json<SyncConfiguration>, ApiError> {
    let user_id = require_caller(&headers)?;
    let update = SelectionUpdate {
        calendar_ids: body.calendar_ids,
        direction: body.direction,
        frequency: body.frequency,
    };
    Ok(Json(ctx.settings.update_selection(user_id, update).await?))
}

async fn list_calendars(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Json<Vec<CalendarListEntry>>, ApiError> {
    let user_id = require_caller(&headers)?;
    Ok(Json(ctx.settings.list_calendars(user_id).await?))
}
