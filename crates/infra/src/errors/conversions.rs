//! Conversions from external infrastructure errors into domain errors.

use calbridge_domain::CalBridgeError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CalBridgeError);

impl From<InfraError> for CalBridgeError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CalBridgeError> for InfraError {
    fn from(value: CalBridgeError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoCalBridgeError {
    fn into_calbridge(self) -> CalBridgeError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CalBridgeError */
/* -------------------------------------------------------------------------- */

impl IntoCalBridgeError for SqlError {
    fn into_calbridge(self) -> CalBridgeError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        CalBridgeError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        CalBridgeError::Database("database is locked".into())
                    }
                    // SQLITE_CONSTRAINT_UNIQUE / SQLITE_CONSTRAINT_PRIMARYKEY
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => {
                        CalBridgeError::Conflict(format!("unique constraint violation: {message}"))
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        CalBridgeError::Database("foreign key constraint violation".into())
                    }
                    _ => CalBridgeError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => CalBridgeError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                CalBridgeError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                CalBridgeError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => {
                CalBridgeError::Database("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidPath(path) => CalBridgeError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => CalBridgeError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_calbridge())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → CalBridgeError */
/* -------------------------------------------------------------------------- */

impl IntoCalBridgeError for r2d2::Error {
    fn into_calbridge(self) -> CalBridgeError {
        CalBridgeError::Database(format!("connection pool error: {self}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(value.into_calbridge())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → CalBridgeError */
/* -------------------------------------------------------------------------- */

impl IntoCalBridgeError for HttpError {
    fn into_calbridge(self) -> CalBridgeError {
        if self.is_timeout() {
            return CalBridgeError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return CalBridgeError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            return status_error(status.as_u16(), status.canonical_reason());
        }

        if self.is_decode() {
            return CalBridgeError::InvalidInput(format!("malformed HTTP response body: {self}"));
        }

        CalBridgeError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_calbridge())
    }
}

/// Map an upstream HTTP status onto the domain taxonomy.
pub(crate) fn status_error(code: u16, reason: Option<&str>) -> CalBridgeError {
    let message = format!("HTTP {} {}", code, reason.unwrap_or("unknown status"));

    match code {
        401 | 403 => CalBridgeError::Auth(message),
        404 | 410 => CalBridgeError::NotFound(message),
        429 => CalBridgeError::RateLimited(message),
        400..=499 => CalBridgeError::InvalidInput(message),
        _ => CalBridgeError::Network(message),
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → CalBridgeError */
/* -------------------------------------------------------------------------- */

impl IntoCalBridgeError for serde_json::Error {
    fn into_calbridge(self) -> CalBridgeError {
        if self.is_io() {
            CalBridgeError::Internal(format!("JSON I/O failure: {self}"))
        } else {
            CalBridgeError::InvalidInput(format!("malformed JSON payload: {self}"))
        }
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(value.into_calbridge())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
