use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// A mock table row: column name → JSON value. No schema is enforced.
pub type Row = serde_json::Map<String, Value>;

/// A runtime value inside the evaluator.
///
/// Timestamps and intervals are milliseconds (since the Unix epoch for
/// timestamps).
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// Any JSON number.
    Number(f64),
    /// Text, including ids compared after cast stripping.
    Text(String),
    /// Point in time, epoch milliseconds.
    Timestamp(i64),
    /// Duration in milliseconds.
    Interval(i64),
}

impl Datum {
    /// Short type name used in mismatch messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Null => "null",
            Datum::Bool(_) => "boolean",
            Datum::Number(_) => "number",
            Datum::Text(_) => "text",
            Datum::Timestamp(_) => "timestamp",
            Datum::Interval(_) => "interval",
        }
    }

    /// Coerce to a timestamp: ISO-8601 text, epoch-millisecond numbers and
    /// timestamps are accepted; NULL stays NULL.
    pub fn to_timestamp(&self) -> Option<Datum> {
        match self {
            Datum::Null => Some(Datum::Null),
            Datum::Timestamp(ms) => Some(Datum::Timestamp(*ms)),
            Datum::Text(s) => parse_timestamp_millis(s).map(Datum::Timestamp),
            #[allow(clippy::cast_possible_truncation)]
            Datum::Number(n) if n.is_finite() => Some(Datum::Timestamp(*n as i64)),
            _ => None,
        }
    }
}

impl From<&Value> for Datum {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Datum::Null,
            Value::Bool(b) => Datum::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(Datum::Null, Datum::Number),
            Value::String(s) => Datum::Text(s.clone()),
            other => Datum::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "null"),
            Datum::Bool(b) => write!(f, "{b}"),
            Datum::Number(n) => write!(f, "{n}"),
            Datum::Text(s) => write!(f, "{s:?}"),
            Datum::Timestamp(ms) => write!(f, "timestamp({ms})"),
            Datum::Interval(ms) => write!(f, "interval({ms}ms)"),
        }
    }
}

/// Parse RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` (space or `T`) or a bare
/// `YYYY-MM-DD` date into epoch milliseconds. Zone-less values are UTC.
pub fn parse_timestamp_millis(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}
