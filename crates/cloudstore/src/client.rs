use aquamon_core::{
    paginate, Alert, AlertPage, AlertQuery, AlertStore, CoreError, Result, SensorLog,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the hosted monitoring backend.
///
/// Cheap to clone; clones share the underlying connection pool, so the
/// same instance can serve as both the sensor log and the alert store.
#[derive(Clone)]
pub struct CloudStore {
    base_url: String,
    client: reqwest::Client,
}

impl CloudStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// The backend has no server-side filtering, so queries pull the
    /// full alert collection and evaluate locally.
    async fn list_alerts(&self) -> Result<Vec<Alert>> {
        let resp = self
            .client
            .get(self.url("alerts"))
            .send()
            .await
            .map_err(|e| CoreError::StoreUnavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(CoreError::StoreUnavailable(format!(
                "GET /alerts returned {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| CoreError::StoreUnavailable(e.to_string()))
    }
}

#[async_trait]
impl SensorLog for CloudStore {
    async fn raw_readings(&self, sensor_id: &str) -> Result<Vec<Value>> {
        let url = self.url(&format!("datalog/{}", sensor_id));
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CoreError::FetchFailed(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(CoreError::FetchFailed(format!(
                "GET {} returned {}",
                url,
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| CoreError::FetchFailed(e.to_string()))
    }
}

#[async_trait]
impl AlertStore for CloudStore {
    async fn insert(&self, alert: &Alert) -> Result<()> {
        let resp = self
            .client
            .post(self.url("alerts"))
            .json(alert)
            .send()
            .await
            .map_err(|e| CoreError::StoreUnavailable(e.to_string()))?;
        match resp.status() {
            StatusCode::CONFLICT => Err(CoreError::DuplicateId(alert.id.clone())),
            status if status.is_success() => Ok(()),
            status => Err(CoreError::StoreUnavailable(format!(
                "POST /alerts returned {}",
                status
            ))),
        }
    }

    async fn known_ids(&self) -> Result<HashSet<String>> {
        let alerts = self.list_alerts().await?;
        Ok(alerts.into_iter().map(|alert| alert.id).collect())
    }

    async fn query(&self, query: &AlertQuery) -> Result<AlertPage> {
        let alerts = self.list_alerts().await?;
        let matched: Vec<Alert> = alerts
            .into_iter()
            .filter(|alert| query.admits(alert))
            .collect();
        Ok(paginate(matched, query.page, query.page_size))
    }

    async fn mark_read(&self, id: &str) -> Result<()> {
        let resp = self
            .client
            .patch(self.url(&format!("alerts/{}", id)))
            .json(&serde_json::json!({ "read": true }))
            .send()
            .await
            .map_err(|e| CoreError::StoreUnavailable(e.to_string()))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(CoreError::NotFound(id.to_string())),
            status if status.is_success() => Ok(()),
            status => Err(CoreError::StoreUnavailable(format!(
                "PATCH /alerts/{} returned {}",
                id, status
            ))),
        }
    }

    async fn dismiss(&self, id: &str) -> Result<()> {
        let resp = self
            .client
            .delete(self.url(&format!("alerts/{}", id)))
            .send()
            .await
            .map_err(|e| CoreError::StoreUnavailable(e.to_string()))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(CoreError::NotFound(id.to_string())),
            status if status.is_success() => Ok(()),
            status => Err(CoreError::StoreUnavailable(format!(
                "DELETE /alerts/{} returned {}",
                id, status
            ))),
        }
    }

    async fn sweep_expired(&self, now_ms: i64) -> Result<usize> {
        let alerts = self.list_alerts().await?;
        let mut removed = 0;
        for alert in alerts {
            if now_ms <= alert.expires_at {
                continue;
            }
            match self.dismiss(&alert.id).await {
                Ok(()) => removed += 1,
                // Another poller got there first.
                Err(CoreError::NotFound(_)) => debug!("Alert {} already removed", alert.id),
                Err(e) => warn!("Failed to remove expired alert {}: {}", alert.id, e),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let store = CloudStore::new("http://localhost:8089");
        assert_eq!(store.url("alerts"), "http://localhost:8089/alerts");
        assert_eq!(store.url("datalog/1"), "http://localhost:8089/datalog/1");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let store = CloudStore::new("http://localhost:8089/");
        assert_eq!(store.base_url(), "http://localhost:8089");
        assert_eq!(store.url("alerts"), "http://localhost:8089/alerts");
    }
}
