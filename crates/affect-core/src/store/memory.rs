//! In-memory record store

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use super::RecordStore;
use crate::alert::{AlertStatus, SystemAlert};
use crate::assessment::PsychologicalAssessment;
use crate::error::{AffectError, Result};
use crate::fusion::FusedEmotionState;
use crate::modality::ModalityEvent;
use crate::session::{AnalysisSession, SessionId};
use crate::types::Timestamp;

#[derive(Debug, Default)]
struct Tables {
    sessions: HashMap<SessionId, AnalysisSession>,
    events: HashMap<SessionId, Vec<ModalityEvent>>,
    fused_states: HashMap<SessionId, Vec<FusedEmotionState>>,
    assessments: HashMap<SessionId, Vec<PsychologicalAssessment>>,
    /// Insertion order
    alerts: Vec<SystemAlert>,
}

/// Process-local store; every table lives behind one lock
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Stable sort by key, so equal keys keep insertion order.
fn sorted_by<T: Clone, K: Ord>(items: Option<&Vec<T>>, key: impl Fn(&T) -> K) -> Vec<T> {
    let mut out: Vec<T> = items.cloned().unwrap_or_default();
    out.sort_by_key(key);
    out
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_session(&self, session: &AnalysisSession) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.sessions.contains_key(&session.id) {
            return Err(AffectError::Store(format!(
                "session {} already exists",
                session.id
            )));
        }
        tables.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn update_session(&self, session: &AnalysisSession) -> Result<()> {
        let mut tables = self.tables.write();
        let slot = tables
            .sessions
            .get_mut(&session.id)
            .ok_or(AffectError::SessionNotFound(session.id))?;
        *slot = session.clone();
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<AnalysisSession>> {
        Ok(self.tables.read().sessions.get(&id).cloned())
    }

    async fn append_event(&self, session_id: SessionId, event: &ModalityEvent) -> Result<()> {
        self.tables
            .write()
            .events
            .entry(session_id)
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn append_fused_state(&self, state: &FusedEmotionState) -> Result<()> {
        self.tables
            .write()
            .fused_states
            .entry(state.session_id)
            .or_default()
            .push(state.clone());
        Ok(())
    }

    async fn append_assessment(&self, assessment: &PsychologicalAssessment) -> Result<()> {
        self.tables
            .write()
            .assessments
            .entry(assessment.session_id)
            .or_default()
            .push(assessment.clone());
        Ok(())
    }

    async fn append_alert(&self, alert: &SystemAlert) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.alerts.iter().any(|a| a.id == alert.id) {
            return Err(AffectError::Store(format!("alert {} already exists", alert.id)));
        }
        tables.alerts.push(alert.clone());
        Ok(())
    }

    async fn latest_assessment(
        &self,
        session_id: SessionId,
    ) -> Result<Option<PsychologicalAssessment>> {
        let tables = self.tables.read();
        Ok(tables
            .assessments
            .get(&session_id)
            .and_then(|list| list.iter().max_by_key(|a| a.timestamp))
            .cloned())
    }

    async fn latest_fused_state(&self, session_id: SessionId) -> Result<Option<FusedEmotionState>> {
        let tables = self.tables.read();
        Ok(tables
            .fused_states
            .get(&session_id)
            .and_then(|list| list.iter().max_by_key(|s| s.timestamp))
            .cloned())
    }

    async fn list_events(&self, session_id: SessionId) -> Result<Vec<ModalityEvent>> {
        let tables = self.tables.read();
        Ok(sorted_by(tables.events.get(&session_id), |e| e.timestamp()))
    }

    async fn list_fused_states(&self, session_id: SessionId) -> Result<Vec<FusedEmotionState>> {
        let tables = self.tables.read();
        Ok(sorted_by(tables.fused_states.get(&session_id), |s| s.timestamp))
    }

    async fn list_assessments(&self, session_id: SessionId) -> Result<Vec<PsychologicalAssessment>> {
        let tables = self.tables.read();
        Ok(sorted_by(tables.assessments.get(&session_id), |a| a.timestamp))
    }

    async fn list_alerts(&self, session_id: Option<SessionId>) -> Result<Vec<SystemAlert>> {
        let tables = self.tables.read();
        let mut alerts: Vec<SystemAlert> = tables
            .alerts
            .iter()
            .rev()
            .filter(|a| session_id.map_or(true, |id| a.session_id == id))
            .cloned()
            .collect();
        // newest first; later inserts win ties
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }

    async fn get_alert(&self, id: Uuid) -> Result<Option<SystemAlert>> {
        Ok(self.tables.read().alerts.iter().find(|a| a.id == id).cloned())
    }

    async fn set_alert_status(
        &self,
        id: Uuid,
        status: AlertStatus,
        at: Timestamp,
    ) -> Result<SystemAlert> {
        let mut tables = self.tables.write();
        let alert = tables
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AffectError::AlertNotFound(id))?;
        alert.transition(status, at)?;
        Ok(alert.clone())
    }
}
