//! Pipeline configuration
//!
//! Every section has defaults, so a config file only needs the keys it
//! changes. Files ending in `.toml` are read as TOML, anything else as JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::alert::AlertPolicy;
use crate::assessment::RiskThresholds;
use crate::error::{AffectError, Result};
use crate::fusion::FusionWeights;

/// Number of alerts shown by default in an alert feed
pub const DEFAULT_FEED_LIMIT: usize = 10;

/// Main pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base weight per modality
    pub fusion: FusionWeights,

    /// Risk rule thresholds
    pub risk: RiskThresholds,

    /// Alert emission and feed settings
    pub alerts: AlertSettings,
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fusion_weights(mut self, weights: FusionWeights) -> Self {
        self.fusion = weights;
        self
    }

    pub fn with_risk_thresholds(mut self, thresholds: RiskThresholds) -> Self {
        self.risk = thresholds;
        self
    }

    pub fn with_alert_policy(mut self, policy: AlertPolicy) -> Self {
        self.alerts.policy = policy;
        self
    }

    pub fn with_feed_limit(mut self, limit: usize) -> Self {
        self.alerts.feed_limit = limit;
        self
    }

    /// Check the values the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        for (name, weight) in [
            ("fusion.facial", self.fusion.facial),
            ("fusion.speech", self.fusion.speech),
            ("fusion.text", self.fusion.text),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(AffectError::Config(format!(
                    "{name} must be a finite, non-negative number (got {weight})"
                )));
            }
        }

        for (name, threshold) in [
            ("risk.anxiety_above", self.risk.anxiety_above),
            ("risk.cooperation_below", self.risk.cooperation_below),
            ("risk.defensiveness_above", self.risk.defensiveness_above),
            ("risk.tension_swing_above", self.risk.tension_swing_above),
        ] {
            if !threshold.is_finite() {
                return Err(AffectError::Config(format!("{name} must be finite")));
            }
        }

        if self.alerts.feed_limit == 0 {
            return Err(AffectError::Config(
                "alerts.feed_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = if is_toml(path) {
            toml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_toml(path) {
            toml::to_string_pretty(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("toml"))
}

/// Alert settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// How repeated risks are turned into alerts
    pub policy: AlertPolicy,

    /// Default size of the alert feed
    pub feed_limit: usize,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            policy: AlertPolicy::DedupeActive,
            feed_limit: DEFAULT_FEED_LIMIT,
        }
    }
}
