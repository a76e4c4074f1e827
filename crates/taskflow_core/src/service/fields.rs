//! Lenient readers and writers for record field values.
//!
//! Stored records are loosely typed (lookups may arrive as `{"Id": n}`,
//! flags as strings); readers normalize and never fail on shape.

use crate::dates::{format_date_input, parse_date_input};
use crate::store::{record_id, Collection, Record, RecordId, StoreError, StoreResult, FIELD_ID};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;

pub(crate) fn required_id(record: &Record, collection: Collection) -> StoreResult<RecordId> {
    record_id(record).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "{} record without `{FIELD_ID}`",
            collection.entity_name()
        ))
    })
}

/// String field; missing or non-string values read as empty.
pub(crate) fn text(record: &Record, field: &str) -> String {
    opt_text(record, field).unwrap_or_default()
}

pub(crate) fn opt_text(record: &Record, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(value) if !value.is_empty() => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

pub(crate) fn flag(record: &Record, field: &str) -> bool {
    match record.get(field) {
        Some(Value::Bool(value)) => *value,
        Some(Value::Number(value)) => value.as_i64() == Some(1),
        Some(Value::String(value)) => value.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

pub(crate) fn int(record: &Record, field: &str) -> Option<i64> {
    as_int(record.get(field)?)
}

/// Lookup field: a bare id or an embedded `{"Id": n}` object.
pub(crate) fn reference(record: &Record, field: &str) -> Option<i64> {
    match record.get(field)? {
        Value::Object(inner) => inner.get(FIELD_ID).and_then(as_int),
        other => as_int(other),
    }
}

pub(crate) fn float(record: &Record, field: &str) -> Option<f64> {
    match record.get(field)? {
        Value::Number(value) => value.as_f64(),
        Value::String(value) => value.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn date(record: &Record, field: &str) -> Option<NaiveDate> {
    record
        .get(field)
        .and_then(Value::as_str)
        .and_then(parse_date_input)
}

pub(crate) fn timestamp(record: &Record, field: &str) -> Option<DateTime<Utc>> {
    let raw = record.get(field).and_then(Value::as_str)?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|stamp| stamp.with_timezone(&Utc))
}

pub(crate) fn date_value(date: Option<NaiveDate>) -> Value {
    date.map_or(Value::Null, |date| Value::String(format_date_input(date)))
}

pub(crate) fn timestamp_value(stamp: Option<DateTime<Utc>>) -> Value {
    stamp.map_or(Value::Null, |stamp| {
        Value::String(stamp.to_rfc3339_opts(SecondsFormat::Millis, true))
    })
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64)),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}
