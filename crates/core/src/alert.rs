//! Alert records and the synthesis step that turns classified readings
//! into new alerts.

use crate::{classify, Reading, SensorKind, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Retention window: alerts expire 7 days after the underlying reading.
pub const ALERT_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// A persisted notification derived from one classified reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub sensor_id: String,
    pub sensor: SensorKind,
    pub location: String,
    pub value: f64,
    /// Epoch ms of the underlying reading, not of alert creation.
    pub created_at: i64,
    #[serde(default)]
    pub read: bool,
    pub expires_at: i64,
}

/// Deterministic alert identity.
///
/// Derived purely from the sensor id, its slug and the reading's
/// normalized timestamp, so re-fetching the same reading on a later
/// cycle produces the same candidate id while distinct sensors of the
/// same kind never collide. This is the deduplication mechanism;
/// anything random or wall-clock based here would mint a fresh alert
/// every poll.
pub fn alert_id(sensor_id: &str, kind: SensorKind, timestamp_ms: i64) -> String {
    format!("{}-{}-{}", sensor_id, kind.slug(), timestamp_ms)
}

/// Build the alert for a reading, or `None` when it would duplicate an
/// already-known alert or is a suppressed normal-status notification.
///
/// Pure given its inputs; persistence is the store's job.
pub fn synthesize(
    reading: &Reading,
    location: &str,
    existing_ids: &HashSet<String>,
    suppress_normal: bool,
) -> Option<Alert> {
    let id = alert_id(&reading.sensor_id, reading.kind, reading.timestamp_ms);
    if existing_ids.contains(&id) {
        return None;
    }

    let class = classify(reading.kind, reading.value);
    if suppress_normal && class.severity == Severity::Normal {
        return None;
    }

    let message = format!(
        "{} measured at {}{} ({})",
        reading.kind.display_name(),
        reading.value,
        reading.kind.unit(),
        class.label,
    );

    Some(Alert {
        id,
        severity: class.severity,
        title: format!("{} alert", reading.kind.display_name()),
        message,
        sensor_id: reading.sensor_id.clone(),
        sensor: reading.kind,
        location: location.to_string(),
        value: reading.value,
        created_at: reading.timestamp_ms,
        read: false,
        expires_at: reading.timestamp_ms + ALERT_TTL_MS,
    })
}
