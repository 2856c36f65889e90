//! Value coercions shared by the metadata reader and the history subsystem.

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Smallest date the store accepts; a NULL date column reads back as this value.
pub fn min_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1753, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Wall-clock time used to stamp audit fields
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// JSON form of a date, matching how date properties serialize
pub fn date_value(date: NaiveDateTime) -> Value {
    serde_json::to_value(date).unwrap_or(Value::Null)
}

/// Join a list value into one delimited string.
///
/// Non-list values pass through untouched.
pub fn join_delimited(value: Value, delimiter: char) -> Value {
    match value {
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            Value::String(parts.join(&delimiter.to_string()))
        }
        other => other,
    }
}

/// Split a delimited string value into a list of strings.
///
/// An empty string is an empty list.
pub fn split_delimited(value: Value, delimiter: char) -> Value {
    match value {
        Value::String(s) if s.is_empty() => Value::Array(Vec::new()),
        Value::String(s) => Value::Array(
            s.split(delimiter)
                .map(|part| Value::String(part.to_string()))
                .collect(),
        ),
        other => other,
    }
}

/// Find the declared variant matching `name`, ignoring case
pub fn enum_variant(name: &str, variants: &[&'static str]) -> Option<&'static str> {
    variants
        .iter()
        .copied()
        .find(|variant| variant.eq_ignore_ascii_case(name))
}

/// Text form of a value as stored in a history column
pub fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Read an integer out of a column value, accepting numeric text
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}
