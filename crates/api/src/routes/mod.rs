//! HTTP surface
//!
//! Identity is supplied by an upstream auth layer through the `x-user-id`
//! header; handlers never verify it themselves.

pub mod health;
pub mod settings;
pub mod sync;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use calbridge_core::sync::RunRejection;
use calbridge_domain::CalBridgeError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::error;

use crate::context::AppContext;
use crate::utils::logging::{error_label, log_request_outcome};

/// Header carrying the authenticated caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Build the application router.
pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .merge(sync::router())
        .merge(settings::router())
        .merge(health::router())
        .route_layer(middleware::from_fn(log_requests))
        .with_state(ctx)
}

/// Standard API error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Error returned by handlers, rendered as a JSON body with a status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }

    pub fn unauthenticated() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", "missing user identity")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse { error: self.message, code: self.code });
        (self.status, body).into_response()
    }
}

impl From<CalBridgeError> for ApiError {
    fn from(err: CalBridgeError) -> Self {
        let code = error_label(&err);
        match err {
            CalBridgeError::InvalidInput(msg) => Self::new(StatusCode::BAD_REQUEST, code, msg),
            CalBridgeError::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, code, msg),
            CalBridgeError::Conflict(msg) => Self::new(StatusCode::CONFLICT, code, msg),
            CalBridgeError::Auth(_) => Self::new(
                StatusCode::PRECONDITION_FAILED,
                code,
                "calendar credentials are no longer valid; reconnect the account",
            ),
            CalBridgeError::RateLimited(msg) => {
                Self::new(StatusCode::TOO_MANY_REQUESTS, code, msg)
            }
            CalBridgeError::Network(_) => {
                Self::new(StatusCode::BAD_GATEWAY, code, "calendar service unavailable")
            }
            other => {
                error!(error = %other, "Request failed with internal error");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", "internal error")
            }
        }
    }
}

impl From<RunRejection> for ApiError {
    fn from(rejection: RunRejection) -> Self {
        let code = rejection.label();
        let message = rejection.to_string();
        match rejection {
            RunRejection::Unauthenticated => Self::unauthenticated(),
            RunRejection::NotConfigured | RunRejection::Disabled | RunRejection::MissingToken => {
                Self::new(StatusCode::PRECONDITION_FAILED, code, message)
            }
            RunRejection::InProgress => Self::new(StatusCode::CONFLICT, code, message),
            RunRejection::InvalidRequest(msg) => Self::new(StatusCode::BAD_REQUEST, code, msg),
            RunRejection::Store(err) => err.into(),
        }
    }
}

/// Caller identity from the auth header, if present and non-blank.
pub(crate) fn caller(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

/// Parse an optional JSON body; an empty body yields the default value.
pub(crate) fn parse_body<T>(body: &[u8]) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("malformed body: {e}")))
}

async fn log_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let started = Instant::now();

    let response = next.run(request).await;
    log_request_outcome(&route, response.status().as_u16(), started.elapsed());
    response
}
