//! Alert Emitter
//!
//! Turns the risks of a session's latest assessment into [`SystemAlert`]s.
//! Earlier assessments never raise alerts.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::assessment::{PsychologicalAssessment, RiskType};
use crate::error::{AffectError, Result};
use crate::types::{Severity, Timestamp};

/// Alert lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AlertStatus::Active),
            "acknowledged" => Some(AlertStatus::Acknowledged),
            "resolved" => Some(AlertStatus::Resolved),
            _ => None,
        }
    }

    /// Check if the alert can move to the given status
    pub fn can_transition_to(self, to: AlertStatus) -> bool {
        matches!(
            (self, to),
            (AlertStatus::Active, AlertStatus::Acknowledged)
                | (AlertStatus::Active, AlertStatus::Resolved)
                | (AlertStatus::Acknowledged, AlertStatus::Resolved)
        )
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert raised for one risk of the latest assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemAlert {
    pub id: Uuid,
    pub session_id: Uuid,
    pub alert_type: RiskType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub status: AlertStatus,
    pub created_at: Timestamp,
    pub acknowledged_at: Option<Timestamp>,
    pub resolved_at: Option<Timestamp>,
}

impl SystemAlert {
    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }

    /// Move to `to`, stamping the matching timestamp.
    pub fn transition(&mut self, to: AlertStatus, at: Timestamp) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(AffectError::InvalidAlertTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }

        match to {
            AlertStatus::Acknowledged => self.acknowledged_at = Some(at),
            AlertStatus::Resolved => self.resolved_at = Some(at),
            AlertStatus::Active => {}
        }
        self.status = to;
        Ok(())
    }

    pub fn acknowledge(&mut self, at: Timestamp) -> Result<()> {
        self.transition(AlertStatus::Acknowledged, at)
    }

    pub fn resolve(&mut self, at: Timestamp) -> Result<()> {
        self.transition(AlertStatus::Resolved, at)
    }
}

/// How repeated risks are handled across runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPolicy {
    /// Skip a risk when an active alert with the same session, type and severity exists
    #[default]
    DedupeActive,
    /// One alert per risk, every time
    AlwaysEmit,
}

/// Builds alerts from the latest assessment
#[derive(Debug, Clone, Default)]
pub struct AlertEmitter {
    policy: AlertPolicy,
}

impl AlertEmitter {
    pub fn new(policy: AlertPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AlertPolicy {
        self.policy
    }

    /// Alerts for `latest`, created at `at`.
    ///
    /// `existing` is the session's stored alerts; only active ones suppress
    /// a new alert, and only under [`AlertPolicy::DedupeActive`]. The risk
    /// timestamps stay on the assessment, `at` is when the alert was raised.
    pub fn emit(
        &self,
        session_id: Uuid,
        latest: Option<&PsychologicalAssessment>,
        existing: &[SystemAlert],
        at: Timestamp,
    ) -> Vec<SystemAlert> {
        let Some(assessment) = latest else {
            return Vec::new();
        };

        let mut out: Vec<SystemAlert> = Vec::new();
        for risk in &assessment.risks {
            if self.policy == AlertPolicy::DedupeActive {
                let duplicate = existing
                    .iter()
                    .chain(out.iter())
                    .filter(|a| a.is_active() && a.session_id == session_id)
                    .any(|a| a.alert_type == risk.risk_type && a.severity == risk.severity);
                if duplicate {
                    continue;
                }
            }

            out.push(SystemAlert {
                id: Uuid::new_v4(),
                session_id,
                alert_type: risk.risk_type,
                severity: risk.severity,
                title: format!("Detected {}", risk.risk_type.title()),
                description: risk.evidence.clone(),
                status: AlertStatus::Active,
                created_at: at,
                acknowledged_at: None,
                resolved_at: None,
            });
        }
        out
    }
}
