//! Alert persistence interface and the in-memory reference store.
//!
//! Remote adapters implement `AlertStore` against whatever protocol the
//! backing service speaks; `MemoryAlertStore` defines the reference
//! query semantics and doubles as the offline fallback.

use crate::{Alert, CoreError, Result, SensorKind, Severity};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// User-facing status filters over the alert feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertFilter {
    All,
    Unread,
    Severity(Severity),
}

impl AlertFilter {
    pub fn matches(&self, alert: &Alert) -> bool {
        match self {
            AlertFilter::All => true,
            AlertFilter::Unread => !alert.read,
            AlertFilter::Severity(severity) => alert.severity == *severity,
        }
    }

    /// Filter codes as used by the settings UI ("error" is the legacy
    /// code for the critical tier).
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "all" => Some(AlertFilter::All),
            "unread" => Some(AlertFilter::Unread),
            "error" => Some(AlertFilter::Severity(Severity::Critical)),
            "warning" => Some(AlertFilter::Severity(Severity::Warning)),
            _ => None,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            AlertFilter::All => "all",
            AlertFilter::Unread => "unread",
            AlertFilter::Severity(Severity::Critical) => "error",
            AlertFilter::Severity(Severity::Warning) => "warning",
            AlertFilter::Severity(Severity::Normal) => "normal",
        }
    }
}

/// One query over the alert feed.
///
/// `kinds` narrows to the visible sensor types and applies before
/// pagination, so hiding a sensor never leaves short pages. `page` is
/// 1-based.
#[derive(Debug, Clone)]
pub struct AlertQuery {
    pub filter: AlertFilter,
    pub kinds: Option<Vec<SensorKind>>,
    pub page: usize,
    pub page_size: usize,
}

impl AlertQuery {
    pub fn new(filter: AlertFilter, page: usize, page_size: usize) -> Self {
        Self {
            filter,
            kinds: None,
            page,
            page_size,
        }
    }

    pub fn with_kinds(mut self, kinds: Option<Vec<SensorKind>>) -> Self {
        self.kinds = kinds;
        self
    }

    /// Whether the alert passes both the kind restriction and the
    /// status filter.
    pub fn admits(&self, alert: &Alert) -> bool {
        let visible = self
            .kinds
            .as_ref()
            .map_or(true, |kinds| kinds.contains(&alert.sensor));
        visible && self.filter.matches(alert)
    }
}

/// One page of the feed, newest first.
#[derive(Debug, Clone, Default)]
pub struct AlertPage {
    pub alerts: Vec<Alert>,
    pub total_pages: usize,
}

/// Persistence surface for alert records.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Persist a new alert. Fails with `DuplicateId` when the id is
    /// already stored; callers absorb that as an expected race.
    async fn insert(&self, alert: &Alert) -> Result<()>;

    /// Snapshot of every stored alert id, read once per polling cycle.
    async fn known_ids(&self) -> Result<HashSet<String>>;

    /// Filtered, newest-first, paginated view of the feed.
    async fn query(&self, query: &AlertQuery) -> Result<AlertPage>;

    /// Set `read = true`. Idempotent on already-read alerts; `NotFound`
    /// when the id is absent.
    async fn mark_read(&self, id: &str) -> Result<()>;

    /// Delete the alert. `NotFound` when the id is absent.
    async fn dismiss(&self, id: &str) -> Result<()>;

    /// Drop every alert whose retention window has passed; returns the
    /// number removed. Safe to run concurrently with inserts.
    async fn sweep_expired(&self, now_ms: i64) -> Result<usize>;
}

/// Sort newest-first with a stable id tie-break, then cut one page.
pub fn paginate(mut alerts: Vec<Alert>, page: usize, page_size: usize) -> AlertPage {
    if page_size == 0 {
        return AlertPage::default();
    }
    alerts.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    let total_pages = (alerts.len() + page_size - 1) / page_size;
    let offset = page.saturating_sub(1).saturating_mul(page_size);
    let alerts = alerts.into_iter().skip(offset).take(page_size).collect();
    AlertPage { alerts, total_pages }
}

/// In-memory alert store keyed by alert id.
#[derive(Clone, Default)]
pub struct MemoryAlertStore {
    alerts: Arc<RwLock<HashMap<String, Alert>>>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.alerts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.alerts.read().await.is_empty()
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn insert(&self, alert: &Alert) -> Result<()> {
        let mut alerts = self.alerts.write().await;
        if alerts.contains_key(&alert.id) {
            return Err(CoreError::DuplicateId(alert.id.clone()));
        }
        alerts.insert(alert.id.clone(), alert.clone());
        Ok(())
    }

    async fn known_ids(&self) -> Result<HashSet<String>> {
        let alerts = self.alerts.read().await;
        Ok(alerts.keys().cloned().collect())
    }

    async fn query(&self, query: &AlertQuery) -> Result<AlertPage> {
        let alerts = self.alerts.read().await;
        let matched: Vec<Alert> = alerts
            .values()
            .filter(|alert| query.admits(alert))
            .cloned()
            .collect();
        Ok(paginate(matched, query.page, query.page_size))
    }

    async fn mark_read(&self, id: &str) -> Result<()> {
        let mut alerts = self.alerts.write().await;
        match alerts.get_mut(id) {
            Some(alert) => {
                alert.read = true;
                Ok(())
            }
            None => Err(CoreError::NotFound(id.to_string())),
        }
    }

    async fn dismiss(&self, id: &str) -> Result<()> {
        let mut alerts = self.alerts.write().await;
        match alerts.remove(id) {
            Some(_) => Ok(()),
            None => Err(CoreError::NotFound(id.to_string())),
        }
    }

    async fn sweep_expired(&self, now_ms: i64) -> Result<usize> {
        let mut alerts = self.alerts.write().await;
        let before = alerts.len();
        alerts.retain(|_, alert| now_ms <= alert.expires_at);
        Ok(before - alerts.len())
    }
}
