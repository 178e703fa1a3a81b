//! Risk Rule Engine
//!
//! Rules are evaluated independently and every matching rule fires:
//!
//! | rule | condition | severity |
//! |---|---|---|
//! | high-anxiety-risk | anxiety > 80 | high |
//! | low-cooperation | cooperation < 30 | medium |
//! | high-defensiveness | defensiveness > 70 | medium |
//! | sharp-emotional-swing | \|tension − previous tension\| > 30 | high |
//!
//! The swing rule only looks at the immediately preceding assessment.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::dimensions::DimensionVector;
use crate::types::{RiskLevel, Severity, Timestamp};

/// Kind of risk detected by a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskType {
    #[serde(rename = "high-anxiety-risk")]
    HighAnxiety,
    #[serde(rename = "low-cooperation")]
    LowCooperation,
    #[serde(rename = "high-defensiveness")]
    HighDefensiveness,
    #[serde(rename = "sharp-emotional-swing")]
    SharpEmotionalSwing,
}

impl RiskType {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskType::HighAnxiety => "high-anxiety-risk",
            RiskType::LowCooperation => "low-cooperation",
            RiskType::HighDefensiveness => "high-defensiveness",
            RiskType::SharpEmotionalSwing => "sharp-emotional-swing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high-anxiety-risk" => Some(RiskType::HighAnxiety),
            "low-cooperation" => Some(RiskType::LowCooperation),
            "high-defensiveness" => Some(RiskType::HighDefensiveness),
            "sharp-emotional-swing" => Some(RiskType::SharpEmotionalSwing),
            _ => None,
        }
    }

    /// Human-readable name used in alert titles
    pub fn title(self) -> &'static str {
        match self {
            RiskType::HighAnxiety => "high anxiety risk",
            RiskType::LowCooperation => "low willingness to cooperate",
            RiskType::HighDefensiveness => "strong defensiveness",
            RiskType::SharpEmotionalSwing => "sharp emotional swing",
        }
    }
}

impl fmt::Display for RiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected risk condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRecord {
    pub risk_type: RiskType,
    pub severity: Severity,
    pub evidence: String,
    pub timestamp: Timestamp,
}

/// Rule thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub anxiety_above: f64,
    pub cooperation_below: f64,
    pub defensiveness_above: f64,
    pub tension_swing_above: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            anxiety_above: 80.0,
            cooperation_below: 30.0,
            defensiveness_above: 70.0,
            tension_swing_above: 30.0,
        }
    }
}

/// Evaluates the rule set against a dimension vector
#[derive(Debug, Clone, Default)]
pub struct RiskEngine {
    thresholds: RiskThresholds,
}

impl RiskEngine {
    pub fn new(thresholds: RiskThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    /// Evaluate all rules. `previous` is the immediately preceding assessment's
    /// dimensions, if any; records are stamped with `at`.
    pub fn evaluate(
        &self,
        dims: &DimensionVector,
        previous: Option<&DimensionVector>,
        at: Timestamp,
    ) -> Vec<RiskRecord> {
        let t = &self.thresholds;
        let mut risks = Vec::new();
        let mut fire = |risk_type: RiskType, severity: Severity, evidence: String| {
            risks.push(RiskRecord {
                risk_type,
                severity,
                evidence,
                timestamp: at,
            });
        };

        if dims.anxiety > t.anxiety_above {
            fire(
                RiskType::HighAnxiety,
                Severity::High,
                format!(
                    "Anxiety reached {:.1}, above the danger threshold of {:.1}",
                    dims.anxiety, t.anxiety_above
                ),
            );
        }

        if dims.cooperation < t.cooperation_below {
            fire(
                RiskType::LowCooperation,
                Severity::Medium,
                format!(
                    "Cooperation is only {:.1}, possible resistance",
                    dims.cooperation
                ),
            );
        }

        if dims.defensiveness > t.defensiveness_above {
            fire(
                RiskType::HighDefensiveness,
                Severity::Medium,
                format!(
                    "Defensiveness reached {:.1}, information may be withheld",
                    dims.defensiveness
                ),
            );
        }

        if let Some(prev) = previous {
            let swing = (dims.tension - prev.tension).abs();
            if swing > t.tension_swing_above {
                fire(
                    RiskType::SharpEmotionalSwing,
                    Severity::High,
                    format!("Tension changed by {:.1} points since the previous reading", swing),
                );
            }
        }

        risks
    }
}

impl RiskLevel {
    /// Aggregate level of one assessment's risk list
    pub fn aggregate(risks: &[RiskRecord]) -> Self {
        RiskLevel::from_severities(risks.iter().map(|r| r.severity))
    }
}
