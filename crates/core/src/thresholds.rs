//! Water quality threshold rules and status classification.
//!
//! The rule table mirrors the deployed probe configuration: pH carries an
//! inner acceptable band plus an outer dangerous band, DO carries only the
//! acceptable band and therefore never escalates past Warning.

use serde::{Deserialize, Serialize};

/// Sensor channels tracked by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    #[serde(rename = "pH")]
    Ph,
    #[serde(rename = "DO")]
    DissolvedOxygen,
}

impl SensorKind {
    /// Stable slug used in alert ids.
    pub fn slug(&self) -> &'static str {
        match self {
            SensorKind::Ph => "ph",
            SensorKind::DissolvedOxygen => "do",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SensorKind::Ph => "pH",
            SensorKind::DissolvedOxygen => "DO",
        }
    }

    /// Measurement unit suffix, empty for dimensionless pH.
    pub fn unit(&self) -> &'static str {
        match self {
            SensorKind::Ph => "",
            SensorKind::DissolvedOxygen => " mg/L",
        }
    }

    pub fn rule(&self) -> &'static ThresholdRule {
        match self {
            SensorKind::Ph => &PH_RULE,
            SensorKind::DissolvedOxygen => &DO_RULE,
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Acceptable band plus an optional outer dangerous band.
///
/// When the dangerous band is present: `dangerous_low < min <= max <
/// dangerous_high`. Sensors without one (DO) top out at Warning.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    pub min: f64,
    pub max: f64,
    pub dangerous_low: Option<f64>,
    pub dangerous_high: Option<f64>,
}

pub const PH_RULE: ThresholdRule = ThresholdRule {
    min: 6.5,
    max: 8.5,
    dangerous_low: Some(5.0),
    dangerous_high: Some(9.0),
};

pub const DO_RULE: ThresholdRule = ThresholdRule {
    min: 5.0,
    max: 12.0,
    dangerous_low: None,
    dangerous_high: None,
};

/// Status tiers in ascending order of severity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Normal => write!(f, "normal"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Classification result for one reading value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub severity: Severity,
    pub label: &'static str,
    pub impact: &'static str,
}

/// Classify a finite reading value against the sensor's rule table.
///
/// Pure and deterministic. The acceptable band is inclusive on both
/// ends; the dangerous band owns its own boundaries, so a pH of exactly
/// 9.0 is already Critical. Non-finite values never reach this function,
/// they are rejected during reading normalization.
pub fn classify(kind: SensorKind, value: f64) -> Classification {
    debug_assert!(value.is_finite(), "non-finite values must be dropped upstream");
    let rule = kind.rule();
    match kind {
        SensorKind::Ph => {
            let low = rule.dangerous_low.unwrap_or(f64::NEG_INFINITY);
            let high = rule.dangerous_high.unwrap_or(f64::INFINITY);
            if value <= low || value >= high {
                Classification {
                    severity: Severity::Critical,
                    label: "dangerous",
                    impact: "pH is outside the survivable band, stock is at immediate risk",
                }
            } else if value < rule.min || value > rule.max {
                Classification {
                    severity: Severity::Warning,
                    label: "caution",
                    impact: "pH is drifting out of the optimal range, monitor closely",
                }
            } else {
                Classification {
                    severity: Severity::Normal,
                    label: "optimal",
                    impact: "pH is within the acceptable range",
                }
            }
        }
        SensorKind::DissolvedOxygen => {
            if value < rule.min {
                Classification {
                    severity: Severity::Warning,
                    label: "oxygen low",
                    impact: "dissolved oxygen is below the healthy range, risk of hypoxia",
                }
            } else if value > rule.max {
                Classification {
                    severity: Severity::Warning,
                    label: "oxygen high",
                    impact: "dissolved oxygen is above the healthy range, check aeration",
                }
            } else {
                Classification {
                    severity: Severity::Normal,
                    label: "optimal",
                    impact: "dissolved oxygen is within the acceptable range",
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ph_boundaries() {
        assert_eq!(classify(SensorKind::Ph, 6.5).severity, Severity::Normal);
        assert_eq!(classify(SensorKind::Ph, 8.5).severity, Severity::Normal);
        assert_eq!(classify(SensorKind::Ph, 7.2).severity, Severity::Normal);
        assert_eq!(classify(SensorKind::Ph, 6.49).severity, Severity::Warning);
        assert_eq!(classify(SensorKind::Ph, 8.51).severity, Severity::Warning);
        assert_eq!(classify(SensorKind::Ph, 4.99).severity, Severity::Critical);
        // The dangerous band owns its boundaries.
        assert_eq!(classify(SensorKind::Ph, 9.0).severity, Severity::Critical);
        assert_eq!(classify(SensorKind::Ph, 9.01).severity, Severity::Critical);
        assert_eq!(classify(SensorKind::Ph, 5.0).severity, Severity::Critical);
    }

    #[test]
    fn test_do_is_two_tier() {
        assert_eq!(classify(SensorKind::DissolvedOxygen, 5.0).severity, Severity::Normal);
        assert_eq!(classify(SensorKind::DissolvedOxygen, 12.0).severity, Severity::Normal);
        assert_eq!(classify(SensorKind::DissolvedOxygen, 4.99).severity, Severity::Warning);
        assert_eq!(classify(SensorKind::DissolvedOxygen, 12.01).severity, Severity::Warning);
        // No critical tier for DO, even at extreme values.
        assert_eq!(classify(SensorKind::DissolvedOxygen, 0.1).severity, Severity::Warning);
        assert_eq!(classify(SensorKind::DissolvedOxygen, 40.0).severity, Severity::Warning);
    }

    #[test]
    fn test_do_labels_distinguish_direction() {
        assert_eq!(classify(SensorKind::DissolvedOxygen, 3.2).label, "oxygen low");
        assert_eq!(classify(SensorKind::DissolvedOxygen, 13.0).label, "oxygen high");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Normal < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let a = classify(SensorKind::Ph, 4.2);
        let b = classify(SensorKind::Ph, 4.2);
        assert_eq!(a, b);
    }
}
