//! Point normalization.
//!
//! Upstream producers disagree about how a sample looks: times arrive as
//! epoch numbers, numeric strings, ISO-8601 strings, calendar records or
//! nested objects, and values arrive as numbers or numeric strings. This
//! module turns all of them into a valid [`Series`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::trace;
use trendwatch_types::{Point, Series};

const TIME_FIELDS: [&str; 2] = ["time", "timestamp"];
const VALUE_FIELDS: [&str; 2] = ["value", "message"];

const NAIVE_DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Normalize raw records into a strictly ascending, duplicate-free series.
///
/// Records whose time or value cannot be read are dropped. When two
/// records share a time, the one appearing later in `raw` wins.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use trendwatch_engine::normalize::normalize;
///
/// let series = normalize(&[
///     json!({ "time": 102, "value": 2 }),
///     json!({ "timestamp": "1970-01-01T00:01:41Z", "value": "1.5" }),
///     json!({ "time": 102, "value": 3 }),
///     json!({ "time": "garbage", "value": 4 }),
/// ]);
///
/// let times: Vec<i64> = series.iter().map(|p| p.time).collect();
/// assert_eq!(times, vec![101, 102]);
/// assert_eq!(series.last().unwrap().value, 3.0);
/// ```
pub fn normalize(raw: &[Value]) -> Series {
    let points: Vec<Point> = raw.iter().filter_map(coerce_point).collect();
    let dropped = raw.len() - points.len();
    if dropped > 0 {
        trace!(dropped, total = raw.len(), "Dropped malformed points");
    }
    Series::from_points(points)
}

/// Read a single record as a point.
///
/// The time is taken from `time`, falling back to `timestamp`; the value
/// from `value`, falling back to `message`.
pub fn coerce_point(raw: &Value) -> Option<Point> {
    let time = field(raw, &TIME_FIELDS).and_then(coerce_time);
    let value = field(raw, &VALUE_FIELDS).and_then(coerce_value);

    match (time, value) {
        (Some(time), Some(value)) => Point::new(time, value),
        _ => {
            trace!(?raw, "Dropped point with unreadable time or value");
            None
        }
    }
}

/// Coerce a time representation to whole epoch seconds.
pub fn coerce_time(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_f64().and_then(truncate_secs),
        Value::String(s) => parse_time_str(s.trim()),
        Value::Object(map) => {
            if let Some(nested) = field(raw, &TIME_FIELDS) {
                return coerce_time(nested);
            }
            let year = map.get("year").and_then(as_integer)?;
            let month = map.get("month").and_then(as_integer)?;
            let day = map.get("day").and_then(as_integer)?;
            calendar_midnight(year, month, day)
        }
        _ => None,
    }
}

/// Coerce a value representation to a finite float.
pub fn coerce_value(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// First present field among `names`. Null and empty strings count as absent.
pub(crate) fn field<'a>(raw: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| raw.get(name))
        .find(|v| !is_blank(v))
}

pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn parse_time_str(s: &str) -> Option<i64> {
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<f64>() {
        return truncate_secs(n);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.timestamp());
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
}

fn calendar_midnight(year: i64, month: i64, day: i64) -> Option<i64> {
    let date = NaiveDate::from_ymd_opt(
        i32::try_from(year).ok()?,
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
    )?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate_secs)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn truncate_secs(secs: f64) -> Option<i64> {
    if !secs.is_finite() || secs.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(secs.trunc() as i64)
}
