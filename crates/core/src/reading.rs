//! Reading normalization at the fetch boundary.
//!
//! Sensor documents in the remote datalog come in several legacy shapes
//! (different value field names, different timestamp encodings). This
//! module is the only place that knows about them; everything past here
//! sees a `Reading` with a finite value and an epoch-millisecond
//! timestamp.

use crate::{Result, SensorKind};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

/// One timestamped measurement from one sensor, normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub sensor_id: String,
    pub kind: SensorKind,
    pub value: f64,
    pub timestamp_ms: i64,
}

/// Read access to the external sensor datalog.
#[async_trait]
pub trait SensorLog: Send + Sync {
    /// All raw documents recorded for `sensor_id`, in any order.
    /// Failures surface as `CoreError::FetchFailed`.
    async fn raw_readings(&self, sensor_id: &str) -> Result<Vec<Value>>;
}

/// Accepted value field names per sensor type, checked in priority order.
fn value_aliases(kind: SensorKind) -> &'static [&'static str] {
    match kind {
        SensorKind::Ph => &["value", "pH", "ph", "PH"],
        SensorKind::DissolvedOxygen => &["value", "DO", "do"],
    }
}

/// Convert any accepted timestamp shape to epoch milliseconds.
///
/// Accepted shapes: `{"seconds": n}` wrappers (document-store native
/// timestamps, in seconds), bare numbers (epoch milliseconds) and
/// ISO-8601 strings. Anything else yields `None`; a reading without a
/// usable timestamp cannot be ordered and is dropped.
pub fn normalize_timestamp(raw: &Value) -> Option<i64> {
    match raw {
        Value::Object(map) => {
            let secs = map.get("seconds")?.as_f64()?;
            if !secs.is_finite() {
                return None;
            }
            Some((secs * 1000.0) as i64)
        }
        Value::Number(n) => {
            let ms = n.as_f64()?;
            if !ms.is_finite() {
                return None;
            }
            Some(ms as i64)
        }
        Value::String(s) => parse_iso_timestamp(s),
        _ => None,
    }
}

fn parse_iso_timestamp(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    // Older loggers wrote naive local-less timestamps; read them as UTC.
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    None
}

fn extract_value(kind: SensorKind, doc: &Value) -> Option<f64> {
    for key in value_aliases(kind) {
        match doc.get(*key) {
            Some(Value::Number(n)) => {
                if let Some(v) = n.as_f64() {
                    if v.is_finite() {
                        return Some(v);
                    }
                }
            }
            Some(Value::String(s)) => {
                if let Ok(v) = s.trim().parse::<f64>() {
                    if v.is_finite() {
                        return Some(v);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Normalize one raw datalog document into a `Reading`.
///
/// Returns `None` when the document has no usable value or timestamp.
/// Missing or non-numeric values are dropped rather than defaulted to
/// zero, so "no data" can never masquerade as an extreme reading.
pub fn parse_reading(sensor_id: &str, kind: SensorKind, doc: &Value) -> Option<Reading> {
    let timestamp_ms = normalize_timestamp(doc.get("timestamp")?)?;
    let value = extract_value(kind, doc)?;
    Some(Reading {
        sensor_id: sensor_id.to_string(),
        kind,
        value,
        timestamp_ms,
    })
}

/// Latest normalized reading for one sensor, or `None` when the log
/// holds no usable entries for it.
pub async fn fetch_latest<S: SensorLog + ?Sized>(
    log: &S,
    sensor_id: &str,
    kind: SensorKind,
) -> Result<Option<Reading>> {
    let docs = log.raw_readings(sensor_id).await?;
    Ok(docs
        .iter()
        .filter_map(|doc| parse_reading(sensor_id, kind, doc))
        .max_by_key(|reading| reading.timestamp_ms))
}
