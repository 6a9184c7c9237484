//! Storage-ready rate entries

use crate::core::error::ParseError;
use crate::core::rates::RebasedRates;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout used in entries and as the store key. Sorts chronologically.
pub const ENTRY_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntry {
    pub timestamp: String,
    pub base_currency: String,
    pub valuations: RebasedRates,
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(ENTRY_TIMESTAMP_FORMAT).to_string()
}

pub fn timestamp_from_unix(seconds: i64) -> Result<DateTime<Utc>, ParseError> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| ParseError::new(format!("timestamp {seconds} is out of range")))
}

pub fn parse_timestamp(formatted: &str) -> Result<DateTime<Utc>, ParseError> {
    chrono::NaiveDateTime::parse_from_str(formatted, ENTRY_TIMESTAMP_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|e| ParseError::new(format!("bad entry timestamp '{formatted}': {e}")))
}

/// Observations are dated, not timed; they are stamped at midnight UTC.
pub fn timestamp_from_date(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Copies `valuations` verbatim under a formatted `timestamp`.
pub fn build_entry(
    timestamp: DateTime<Utc>,
    base_currency: &str,
    valuations: RebasedRates,
) -> CanonicalEntry {
    CanonicalEntry {
        timestamp: format_timestamp(timestamp),
        base_currency: base_currency.to_string(),
        valuations,
    }
}
