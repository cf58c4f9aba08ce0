//! Column encoding shared by the SQLite repositories
//!
//! Instants are stored as UTC epoch milliseconds; enums as their snake_case
//! names; string lists as JSON arrays.

use std::str::FromStr;

use calbridge_domain::CalBridgeError;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;

pub(crate) fn to_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

pub(crate) fn opt_millis(instant: Option<DateTime<Utc>>) -> Option<i64> {
    instant.map(to_millis)
}

pub(crate) fn from_millis(column: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            Type::Integer,
            Box::new(CalBridgeError::Database(format!("timestamp out of range: {millis}"))),
        )
    })
}

pub(crate) fn from_opt_millis(
    column: usize,
    millis: Option<i64>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    millis.map(|value| from_millis(column, value)).transpose()
}

pub(crate) fn parse_text<T>(column: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = CalBridgeError>,
{
    value.parse::<T>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
    })
}

pub(crate) fn parse_json<T>(column: usize, value: &str) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(value)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err)))
}
