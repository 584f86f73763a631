//! Persisted user preferences: refresh cadence and alert visibility.
//!
//! The preference store is injected wherever cadence or visibility is
//! needed; there is no ambient global state. Keys keep the legacy
//! camelCase names so existing stored settings carry over.

use crate::{Result, SensorKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

pub const REFRESH_INTERVAL_KEY: &str = "refreshInterval";
pub const SHOW_PH_ALERTS_KEY: &str = "showPHAlerts";
pub const SHOW_DO_ALERTS_KEY: &str = "showDOAlerts";
pub const SHOW_NORMAL_ALERTS_KEY: &str = "showNormalAlerts";

/// Polling cadence options offered by the settings screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshInterval {
    TenSeconds,
    FiveMinutes,
    ThirtyMinutes,
    ThreeHours,
    TwentyFourHours,
}

impl RefreshInterval {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "10s" => Some(RefreshInterval::TenSeconds),
            "5m" => Some(RefreshInterval::FiveMinutes),
            "30m" => Some(RefreshInterval::ThirtyMinutes),
            "3h" => Some(RefreshInterval::ThreeHours),
            "24h" => Some(RefreshInterval::TwentyFourHours),
            _ => None,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            RefreshInterval::TenSeconds => "10s",
            RefreshInterval::FiveMinutes => "5m",
            RefreshInterval::ThirtyMinutes => "30m",
            RefreshInterval::ThreeHours => "3h",
            RefreshInterval::TwentyFourHours => "24h",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            RefreshInterval::TenSeconds => Duration::from_secs(10),
            RefreshInterval::FiveMinutes => Duration::from_secs(5 * 60),
            RefreshInterval::ThirtyMinutes => Duration::from_secs(30 * 60),
            RefreshInterval::ThreeHours => Duration::from_secs(3 * 60 * 60),
            RefreshInterval::TwentyFourHours => Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl Default for RefreshInterval {
    fn default() -> Self {
        RefreshInterval::TenSeconds
    }
}

/// Per-sensor display toggles, read at display-filter time only.
/// Hiding a sensor never affects what gets stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertVisibility {
    pub show_ph: bool,
    pub show_do: bool,
}

impl AlertVisibility {
    pub fn shows(&self, kind: SensorKind) -> bool {
        match kind {
            SensorKind::Ph => self.show_ph,
            SensorKind::DissolvedOxygen => self.show_do,
        }
    }

    /// `None` when every sensor type is visible (no restriction).
    pub fn visible_kinds(&self) -> Option<Vec<SensorKind>> {
        if self.show_ph && self.show_do {
            return None;
        }
        let mut kinds = Vec::new();
        if self.show_ph {
            kinds.push(SensorKind::Ph);
        }
        if self.show_do {
            kinds.push(SensorKind::DissolvedOxygen);
        }
        Some(kinds)
    }
}

/// Simple persisted key-value settings.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);

    /// Configured polling cadence; missing or unknown codes fall back
    /// to the 10 second default.
    fn refresh_interval(&self) -> RefreshInterval {
        self.get(REFRESH_INTERVAL_KEY)
            .and_then(|code| RefreshInterval::from_code(&code))
            .unwrap_or_default()
    }

    fn set_refresh_interval(&self, interval: RefreshInterval) {
        self.set(REFRESH_INTERVAL_KEY, interval.as_code());
    }

    /// Sensors are visible unless explicitly toggled off.
    fn alert_visibility(&self) -> AlertVisibility {
        AlertVisibility {
            show_ph: self.get(SHOW_PH_ALERTS_KEY).as_deref() != Some("false"),
            show_do: self.get(SHOW_DO_ALERTS_KEY).as_deref() != Some("false"),
        }
    }

    /// Whether normal-status readings should also produce alerts.
    /// Off by default: only warnings and criticals are recorded.
    fn show_normal_alerts(&self) -> bool {
        self.get(SHOW_NORMAL_ALERTS_KEY).as_deref() == Some("true")
    }
}

/// Volatile preference store for tests and dry runs.
#[derive(Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

/// JSON-file-backed preferences under the user config directory.
pub struct FilePreferences {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FilePreferences {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aquamon")
    }

    pub fn default_path() -> PathBuf {
        Self::config_dir().join("preferences.json")
    }

    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    pub fn load_from(path: PathBuf) -> Result<Self> {
        let values = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    fn save(&self, values: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl Default for FilePreferences {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            values: Mutex::new(HashMap::new()),
        }
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = self.values.lock().unwrap();
        values.insert(key.to_string(), value.to_string());
        if let Err(e) = self.save(&values) {
            warn!("Failed to save preferences to {:?}: {}", self.path, e);
        }
    }
}
