//! Read-side views over a session's stored records

use serde::{Deserialize, Serialize};

use crate::alert::SystemAlert;
use crate::assessment::{RadarPoint, RiskRecord};
use crate::error::{AffectError, Result};
use crate::fusion::AffectPoint;
use crate::modality::{FacialExpression, ModalityEvent, SpeechEmotion};
use crate::session::{SessionId, SessionStatus};
use crate::store::RecordStore;
use crate::types::{RiskLevel, Timestamp};

/// One point of the overall-intensity time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityPoint {
    pub timestamp: Timestamp,
    pub intensity: f64,
}

/// Everything a client shows for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResults {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub progress: u8,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub error_message: Option<String>,
    pub intensity_series: Vec<IntensityPoint>,
    /// Intensity of the latest assessment, 0 when there is none
    pub current_intensity: f64,
    pub average_intensity: f64,
    pub peak_intensity: f64,
    /// Activation/valence of the latest fused state
    pub current_affect: Option<AffectPoint>,
    /// Most recent facial expression seen in the session
    pub latest_expression: Option<FacialExpression>,
    /// Most recent speech emotion seen in the session
    pub latest_speech_emotion: Option<SpeechEmotion>,
    /// Radar of the latest assessment
    pub radar: Option<Vec<RadarPoint>>,
    pub risks: Vec<RiskRecord>,
    pub suggestions: Vec<String>,
    pub risk_level: RiskLevel,
}

#[derive(Debug)]
pub struct ResultsView;

impl ResultsView {
    /// Assemble the results of a session from the store.
    pub async fn load(store: &dyn RecordStore, session_id: SessionId) -> Result<SessionResults> {
        let session = store
            .get_session(session_id)
            .await?
            .ok_or(AffectError::SessionNotFound(session_id))?;
        let assessments = store.list_assessments(session_id).await?;
        let current_affect = store
            .latest_fused_state(session_id)
            .await?
            .map(|s| s.affect());
        let events = store.list_events(session_id).await?;
        let latest_expression = events.iter().rev().find_map(|e| match e {
            ModalityEvent::Facial(f) => Some(f.expression().clone()),
            _ => None,
        });
        let latest_speech_emotion = events.iter().rev().find_map(|e| match e {
            ModalityEvent::Speech(s) => Some(s.emotion().clone()),
            _ => None,
        });

        let intensity_series: Vec<IntensityPoint> = assessments
            .iter()
            .map(|a| IntensityPoint {
                timestamp: a.timestamp,
                intensity: a.overall_intensity,
            })
            .collect();
        let average_intensity = if intensity_series.is_empty() {
            0.0
        } else {
            intensity_series.iter().map(|p| p.intensity).sum::<f64>() / intensity_series.len() as f64
        };
        let peak_intensity = intensity_series
            .iter()
            .map(|p| p.intensity)
            .fold(0.0, f64::max);

        let latest = assessments.last();
        Ok(SessionResults {
            session_id,
            status: session.status,
            progress: session.progress(),
            started_at: session.started_at,
            ended_at: session.ended_at,
            error_message: session.error_message,
            current_intensity: latest.map_or(0.0, |a| a.overall_intensity),
            average_intensity,
            peak_intensity,
            current_affect,
            latest_expression,
            latest_speech_emotion,
            radar: latest.map(|a| a.radar.clone()),
            risks: latest.map(|a| a.risks.clone()).unwrap_or_default(),
            suggestions: latest.map(|a| a.suggestions.clone()).unwrap_or_default(),
            risk_level: latest.map_or(RiskLevel::Low, |a| a.risk_level),
            intensity_series,
        })
    }
}

/// Newest alerts first, at most `limit`, optionally for one session.
pub async fn alert_feed(
    store: &dyn RecordStore,
    session_id: Option<SessionId>,
    limit: usize,
) -> Result<Vec<SystemAlert>> {
    let mut alerts = store.list_alerts(session_id).await?;
    alerts.truncate(limit);
    Ok(alerts)
}
