//! Core types shared across the pipeline
//!
//! - Timestamps
//! - Severity of a single risk or alert
//! - Aggregate risk level of an assessment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type alias
pub type Timestamp = DateTime<Utc>;

/// Create a timestamp for the current moment
pub fn now() -> Timestamp {
    Utc::now()
}

/// Clamp a score into the unit interval. NaN and infinities collapse to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Clamp a dimension score into [0, 100].
pub(crate) fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Severity of a risk record or alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate risk level of one assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Fold a list of severities into a single level.
    ///
    /// - critical: two or more high, or one high with two or more medium
    /// - high: one high, or three or more medium
    /// - medium: at least one medium
    /// - low: otherwise
    ///
    /// Low and critical severities on individual records do not move the level.
    pub fn from_severities<I>(severities: I) -> Self
    where
        I: IntoIterator<Item = Severity>,
    {
        let (mut high, mut medium) = (0usize, 0usize);
        for severity in severities {
            match severity {
                Severity::High => high += 1,
                Severity::Medium => medium += 1,
                Severity::Low | Severity::Critical => {}
            }
        }

        if high >= 2 || (high >= 1 && medium >= 2) {
            RiskLevel::Critical
        } else if high >= 1 || medium >= 3 {
            RiskLevel::High
        } else if medium >= 1 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
