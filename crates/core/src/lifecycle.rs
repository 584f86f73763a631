//! Alert lifecycle orchestration: polling cycles, the alert feed query
//! surface, and read/dismiss commands.
//!
//! One cycle is Fetching -> Evaluating -> Persisting. Failures are
//! contained per sensor and per alert; only an unreachable alert store
//! aborts a cycle, and the next scheduled tick retries at the same
//! cadence.

use crate::{
    epoch_ms, fetch_latest, synthesize, Alert, AlertFilter, AlertPage, AlertQuery, AlertStore,
    CoreError, PollScheduler, PreferenceStore, Reading, Result, SensorKind, SensorLog,
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Upper bound on one sensor fetch before the cycle gives up on it.
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Page size used by the notification feed.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// One tracked probe.
#[derive(Debug, Clone)]
pub struct SensorSpec {
    pub id: String,
    pub kind: SensorKind,
    pub location: String,
}

/// The two probes of the deployed setup.
pub fn default_sensors() -> Vec<SensorSpec> {
    vec![
        SensorSpec {
            id: "1".to_string(),
            kind: SensorKind::Ph,
            location: "Fish pond A".to_string(),
        },
        SensorSpec {
            id: "2".to_string(),
            kind: SensorKind::DissolvedOxygen,
            location: "Shrimp pond B".to_string(),
        },
    ]
}

pub struct AlertEngine<S, A, P> {
    sensors: Vec<SensorSpec>,
    log: S,
    store: A,
    prefs: P,
    /// Held for the duration of a cycle; a tick that finds it taken
    /// skips instead of overlapping the previous cycle.
    cycle_gate: Mutex<()>,
    last_refresh_ms: RwLock<Option<i64>>,
}

impl<S, A, P> AlertEngine<S, A, P>
where
    S: SensorLog + 'static,
    A: AlertStore + 'static,
    P: PreferenceStore + 'static,
{
    pub fn new(sensors: Vec<SensorSpec>, log: S, store: A, prefs: P) -> Self {
        Self {
            sensors,
            log,
            store,
            prefs,
            cycle_gate: Mutex::new(()),
            last_refresh_ms: RwLock::new(None),
        }
    }

    /// Epoch ms of the last cycle in which at least one sensor
    /// answered, `None` until then. Presentation uses this as its
    /// staleness indicator, so cycles that reached nothing do not
    /// advance it.
    pub async fn last_refresh(&self) -> Option<i64> {
        *self.last_refresh_ms.read().await
    }

    /// Run one polling cycle; returns the number of alerts persisted.
    ///
    /// A cycle already in flight makes this call a no-op.
    pub async fn run_cycle(&self) -> usize {
        let _gate = match self.cycle_gate.try_lock() {
            Ok(gate) => gate,
            Err(_) => {
                debug!("Previous polling cycle still running, skipping this tick");
                return 0;
            }
        };

        let now_ms = epoch_ms();
        match self.store.sweep_expired(now_ms).await {
            Ok(0) => {}
            Ok(removed) => debug!("Swept {} expired alerts", removed),
            Err(e) => warn!("Expiry sweep failed: {}", e),
        }

        let existing_ids = match self.store.known_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!("Alert store unavailable, aborting cycle: {}", e);
                return 0;
            }
        };

        // Fetching: all sensors concurrently, failures isolated per sensor.
        let log = &self.log;
        let fetches = self.sensors.iter().map(|spec| async move {
            let outcome = timeout(FETCH_TIMEOUT, fetch_latest(log, &spec.id, spec.kind)).await;
            (spec, outcome)
        });

        let mut readings: Vec<(&SensorSpec, Reading)> = Vec::new();
        let mut reachable = 0usize;
        for (spec, outcome) in join_all(fetches).await {
            match outcome {
                Ok(Ok(Some(reading))) => {
                    reachable += 1;
                    readings.push((spec, reading));
                }
                Ok(Ok(None)) => {
                    reachable += 1;
                    debug!("No usable readings for sensor {}", spec.id);
                }
                Ok(Err(e)) => warn!("Fetch failed for sensor {}: {}", spec.id, e),
                Err(_) => warn!("Fetch timed out for sensor {}", spec.id),
            }
        }

        // Evaluating: one ids snapshot for the whole cycle.
        let suppress_normal = !self.prefs.show_normal_alerts();
        let alerts: Vec<Alert> = readings
            .iter()
            .filter_map(|(spec, reading)| {
                synthesize(reading, &spec.location, &existing_ids, suppress_normal)
            })
            .collect();

        // Persisting: per-alert failures do not block the rest.
        let mut persisted = 0;
        for alert in &alerts {
            match self.store.insert(alert).await {
                Ok(()) => {
                    info!("New {} alert {}: {}", alert.severity, alert.id, alert.message);
                    persisted += 1;
                }
                Err(CoreError::DuplicateId(id)) => {
                    // Expected race with a concurrent poller.
                    debug!("Alert {} already stored", id);
                }
                Err(e) => warn!("Failed to persist alert {}: {}", alert.id, e),
            }
        }

        // A cycle where no sensor answered is not a refresh.
        if reachable > 0 {
            *self.last_refresh_ms.write().await = Some(now_ms);
        }
        persisted
    }

    /// Alert feed page for presentation: visibility toggles apply
    /// first, then the status filter, then pagination.
    pub async fn alerts(
        &self,
        filter: AlertFilter,
        page: usize,
        page_size: usize,
    ) -> Result<AlertPage> {
        let visibility = self.prefs.alert_visibility();
        let query =
            AlertQuery::new(filter, page, page_size).with_kinds(visibility.visible_kinds());
        self.store.query(&query).await
    }

    /// Mark one alert read. A missing id is reported as `NotFound`;
    /// presentation treats it as a no-op with a warning.
    pub async fn mark_read(&self, id: &str) -> Result<()> {
        match self.store.mark_read(id).await {
            Err(e @ CoreError::NotFound(_)) => {
                warn!("mark_read: alert {} no longer exists", id);
                Err(e)
            }
            other => other,
        }
    }

    /// Dismiss (delete) one alert.
    pub async fn dismiss(&self, id: &str) -> Result<()> {
        match self.store.dismiss(id).await {
            Err(e @ CoreError::NotFound(_)) => {
                warn!("dismiss: alert {} no longer exists", id);
                Err(e)
            }
            other => other,
        }
    }

    /// Start periodic re-evaluation. The first cycle runs immediately;
    /// the cadence preference is re-read after every cycle, so changes
    /// take effect by the next tick.
    pub fn start(self: &Arc<Self>) -> PollScheduler {
        let engine = Arc::clone(self);
        PollScheduler::spawn(move || {
            let engine = Arc::clone(&engine);
            async move {
                engine.run_cycle().await;
                engine.prefs.refresh_interval().duration()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        alert_id, MemoryAlertStore, MemoryPreferences, RefreshInterval, Severity,
        SHOW_NORMAL_ALERTS_KEY, SHOW_PH_ALERTS_KEY,
    };
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    /// Canned datalog: per-sensor documents, with optional forced
    /// failures to simulate a partial outage.
    #[derive(Default)]
    struct StubLog {
        docs: HashMap<String, Vec<Value>>,
        failing: Vec<String>,
    }

    impl StubLog {
        fn with_doc(mut self, sensor_id: &str, doc: Value) -> Self {
            self.docs.entry(sensor_id.to_string()).or_default().push(doc);
            self
        }

        fn failing(mut self, sensor_id: &str) -> Self {
            self.failing.push(sensor_id.to_string());
            self
        }
    }

    #[async_trait]
    impl SensorLog for StubLog {
        async fn raw_readings(&self, sensor_id: &str) -> Result<Vec<Value>> {
            if self.failing.iter().any(|id| id == sensor_id) {
                return Err(CoreError::FetchFailed("sensor offline".to_string()));
            }
            Ok(self.docs.get(sensor_id).cloned().unwrap_or_default())
        }
    }

    fn engine(
        log: StubLog,
    ) -> AlertEngine<StubLog, MemoryAlertStore, MemoryPreferences> {
        AlertEngine::new(
            default_sensors(),
            log,
            MemoryAlertStore::new(),
            MemoryPreferences::new(),
        )
    }

    #[tokio::test]
    async fn test_critical_ph_cycle_end_to_end() {
        let ts = epoch_ms();
        let log = StubLog::default()
            .with_doc("1", json!({ "timestamp": ts, "value": 4.2 }));
        let engine = engine(log);

        assert_eq!(engine.run_cycle().await, 1);
        assert!(engine.last_refresh().await.is_some());

        let critical = engine
            .alerts(AlertFilter::Severity(Severity::Critical), 1, DEFAULT_PAGE_SIZE)
            .await
            .unwrap();
        assert_eq!(critical.alerts.len(), 1);
        let alert = &critical.alerts[0];
        assert!(alert.message.contains("4.2"));
        assert_eq!(alert.id, alert_id("1", SensorKind::Ph, ts));

        // Unread until marked.
        let unread = engine
            .alerts(AlertFilter::Unread, 1, DEFAULT_PAGE_SIZE)
            .await
            .unwrap();
        assert_eq!(unread.alerts.len(), 1);

        engine.mark_read(&alert.id).await.unwrap();
        let unread = engine
            .alerts(AlertFilter::Unread, 1, DEFAULT_PAGE_SIZE)
            .await
            .unwrap();
        assert!(unread.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_partial_sensor_outage() {
        let ts = epoch_ms();
        let log = StubLog::default()
            .with_doc("1", json!({ "timestamp": ts, "value": 4.2 }))
            .failing("2");
        let engine = engine(log);

        // The failing DO sensor is logged and skipped; the pH alert
        // still lands.
        assert_eq!(engine.run_cycle().await, 1);
        let page = engine
            .alerts(AlertFilter::All, 1, DEFAULT_PAGE_SIZE)
            .await
            .unwrap();
        assert_eq!(page.alerts.len(), 1);
        assert_eq!(page.alerts[0].sensor, SensorKind::Ph);
    }

    #[tokio::test]
    async fn test_same_kind_sensors_alert_independently() {
        let ts = epoch_ms();
        let sensors = vec![
            SensorSpec {
                id: "1".to_string(),
                kind: SensorKind::Ph,
                location: "Fish pond A".to_string(),
            },
            SensorSpec {
                id: "7".to_string(),
                kind: SensorKind::Ph,
                location: "Fish pond C".to_string(),
            },
        ];
        // Both pH probes report at the same timestamp.
        let log = StubLog::default()
            .with_doc("1", json!({ "timestamp": ts, "value": 4.2 }))
            .with_doc("7", json!({ "timestamp": ts, "value": 9.5 }));
        let engine = AlertEngine::new(
            sensors,
            log,
            MemoryAlertStore::new(),
            MemoryPreferences::new(),
        );

        assert_eq!(engine.run_cycle().await, 2);
        let page = engine
            .alerts(AlertFilter::All, 1, DEFAULT_PAGE_SIZE)
            .await
            .unwrap();
        assert_eq!(page.alerts.len(), 2);
        let mut ids: Vec<String> = page.alerts.iter().map(|a| a.id.clone()).collect();
        ids.sort();
        assert_eq!(
            ids,
            vec![
                alert_id("1", SensorKind::Ph, ts),
                alert_id("7", SensorKind::Ph, ts)
            ]
        );
    }

    #[tokio::test]
    async fn test_total_outage_does_not_advance_last_refresh() {
        let log = StubLog::default().failing("1").failing("2");
        let engine = engine(log);

        assert_eq!(engine.run_cycle().await, 0);
        assert_eq!(engine.last_refresh().await, None);
    }

    #[tokio::test]
    async fn test_repeated_cycles_do_not_duplicate() {
        let ts = epoch_ms();
        let log = StubLog::default()
            .with_doc("1", json!({ "timestamp": ts, "value": 4.2 }))
            .with_doc("2", json!({ "timestamp": ts, "value": 3.0 }));
        let engine = engine(log);

        assert_eq!(engine.run_cycle().await, 2);
        // Same readings fetched again: dedup keeps the feed unchanged.
        assert_eq!(engine.run_cycle().await, 0);
        assert_eq!(engine.run_cycle().await, 0);

        let page = engine
            .alerts(AlertFilter::All, 1, DEFAULT_PAGE_SIZE)
            .await
            .unwrap();
        assert_eq!(page.alerts.len(), 2);
    }

    #[tokio::test]
    async fn test_normal_readings_suppressed_by_default() {
        let ts = epoch_ms();
        let log = StubLog::default()
            .with_doc("1", json!({ "timestamp": ts, "value": 7.2 }));
        let engine = engine(log);

        assert_eq!(engine.run_cycle().await, 0);

        // Opting in records the same reading on the next cycle.
        engine.prefs.set(SHOW_NORMAL_ALERTS_KEY, "true");
        assert_eq!(engine.run_cycle().await, 1);
        let page = engine
            .alerts(AlertFilter::All, 1, DEFAULT_PAGE_SIZE)
            .await
            .unwrap();
        assert_eq!(page.alerts[0].severity, Severity::Normal);
    }

    #[tokio::test]
    async fn test_visibility_toggle_hides_but_keeps_alerts() {
        let ts = epoch_ms();
        let log = StubLog::default()
            .with_doc("1", json!({ "timestamp": ts, "value": 4.2 }))
            .with_doc("2", json!({ "timestamp": ts, "value": 3.0 }));
        let engine = engine(log);
        assert_eq!(engine.run_cycle().await, 2);

        engine.prefs.set(SHOW_PH_ALERTS_KEY, "false");
        let page = engine
            .alerts(AlertFilter::All, 1, DEFAULT_PAGE_SIZE)
            .await
            .unwrap();
        assert_eq!(page.alerts.len(), 1);
        assert_eq!(page.alerts[0].sensor, SensorKind::DissolvedOxygen);

        // The pH alert is still stored, just not shown.
        engine.prefs.set(SHOW_PH_ALERTS_KEY, "true");
        let page = engine
            .alerts(AlertFilter::All, 1, DEFAULT_PAGE_SIZE)
            .await
            .unwrap();
        assert_eq!(page.alerts.len(), 2);
    }

    #[tokio::test]
    async fn test_legacy_field_aliases_flow_through() {
        let ts = epoch_ms();
        let log = StubLog::default()
            .with_doc("1", json!({ "timestamp": { "seconds": ts / 1000 }, "pH": 4.2 }))
            .with_doc("2", json!({ "timestamp": ts, "DO": "3.0" }));
        let engine = engine(log);

        assert_eq!(engine.run_cycle().await, 2);
    }

    #[tokio::test]
    async fn test_mark_read_on_missing_id_is_not_found() {
        let engine = engine(StubLog::default());
        let err = engine.mark_read("1-ph-404").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_scheduler_integration_first_run_is_immediate() {
        let ts = epoch_ms();
        let log = StubLog::default()
            .with_doc("1", json!({ "timestamp": ts, "value": 4.2 }));
        let engine = Arc::new(engine(log));
        engine
            .prefs
            .set_refresh_interval(RefreshInterval::TwentyFourHours);

        let scheduler = engine.start();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let page = engine
            .alerts(AlertFilter::All, 1, DEFAULT_PAGE_SIZE)
            .await
            .unwrap();
        assert_eq!(page.alerts.len(), 1);
        scheduler.stop().await;
    }
}
