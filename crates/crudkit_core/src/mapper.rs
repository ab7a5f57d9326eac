//! Storage <-> domain value conversions.
//!
//! # Responsibility
//! - Translate stored column values into domain values and back.
//!
//! # Invariants
//! - Money is stored as exact decimal text. It becomes an `f64` JSON number
//!   only at the output boundary, and only when that number reads back as
//!   the same decimal.
//! - Calendar dates are stored as `YYYY-MM-DD` and surface as midnight UTC,
//!   so the same stored day maps to the same instant in every time zone.
//! - Timestamps are stored as epoch milliseconds.
//! - Absent list columns surface as empty vectors.

use crate::db::StorageError;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::ser::Error as _;
use serde::Serializer;
use std::str::FromStr;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

type MapResult<T> = Result<T, StorageError>;

pub fn decimal_to_storage(value: Decimal) -> String {
    value.to_string()
}

pub fn decimal_from_storage(text: &str, column: &str) -> MapResult<Decimal> {
    Decimal::from_str(text)
        .map_err(|_| StorageError::InvalidData(format!("invalid decimal `{text}` in {column}")))
}

/// Largest accepted money amount. With two decimal places every amount up
/// to it has at most 15 significant digits, which an `f64` carries exactly.
pub const MAX_MONEY: i64 = 10_000_000_000_000;

/// Converts money to the JSON number surfaced at the boundary.
///
/// # Errors
/// - `InvalidData` when the nearest `f64` does not read back as `value`.
pub fn money_to_number(value: Decimal) -> MapResult<f64> {
    let inexact = || StorageError::InvalidData(format!("money `{value}` has no exact number form"));
    let number: f64 = value.to_string().parse().map_err(|_| inexact())?;
    match Decimal::from_str(&number.to_string()) {
        Ok(back) if back == value => Ok(number),
        _ => Err(inexact()),
    }
}

/// `serialize_with` adapter for money fields.
pub fn serialize_money<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    let number = money_to_number(*value).map_err(S::Error::custom)?;
    serializer.serialize_f64(number)
}

/// `serialize_with` adapter for nullable money fields.
pub fn serialize_money_option<S: Serializer>(
    value: &Option<Decimal>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => serialize_money(value, serializer),
        None => serializer.serialize_none(),
    }
}

pub fn date_to_storage(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn date_from_storage(text: &str, column: &str) -> MapResult<DateTime<Utc>> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map(midnight_utc)
        .map_err(|_| StorageError::InvalidData(format!("invalid date `{text}` in {column}")))
}

/// Pins a calendar date at 00:00:00 UTC.
pub fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

pub fn timestamp_to_storage(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub fn timestamp_from_storage(millis: i64, column: &str) -> MapResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        StorageError::InvalidData(format!("timestamp `{millis}` out of range in {column}"))
    })
}

/// Current wall-clock time as stored (millisecond precision).
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn id_to_storage(id: Uuid) -> String {
    id.to_string()
}

pub fn id_from_storage(text: &str, column: &str) -> MapResult<Uuid> {
    Uuid::parse_str(text)
        .map_err(|_| StorageError::InvalidData(format!("invalid uuid `{text}` in {column}")))
}

/// Encodes a list column; empty lists are stored as NULL.
pub fn list_to_storage(items: &[String]) -> MapResult<Option<String>> {
    if items.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(items)
        .map(Some)
        .map_err(|err| StorageError::InvalidData(format!("cannot encode list: {err}")))
}

pub fn list_from_storage(text: Option<&str>, column: &str) -> MapResult<Vec<String>> {
    match text {
        None => Ok(Vec::new()),
        Some(text) => serde_json::from_str(text).map_err(|_| {
            StorageError::InvalidData(format!("invalid list `{text}` in {column}"))
        }),
    }
}

pub fn bool_to_storage(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub fn bool_from_storage(value: i64, column: &str) -> MapResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StorageError::InvalidData(format!(
            "invalid boolean `{other}` in {column}"
        ))),
    }
}
