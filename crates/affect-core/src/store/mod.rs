//! Record store seam
//!
//! The pipeline persists everything it derives through [`RecordStore`].
//! Derived records are append-only; the session row and alert status are the
//! only things ever updated in place.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::alert::{AlertStatus, SystemAlert};
use crate::assessment::PsychologicalAssessment;
use crate::error::Result;
use crate::fusion::FusedEmotionState;
use crate::modality::ModalityEvent;
use crate::session::{AnalysisSession, SessionId};
use crate::types::Timestamp;

#[async_trait]
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    /// Insert a new session row. Fails with `Store` if the id already exists.
    async fn create_session(&self, session: &AnalysisSession) -> Result<()>;

    /// Overwrite the stored session row. Fails with `SessionNotFound` if absent.
    async fn update_session(&self, session: &AnalysisSession) -> Result<()>;

    async fn get_session(&self, id: SessionId) -> Result<Option<AnalysisSession>>;

    async fn append_event(&self, session_id: SessionId, event: &ModalityEvent) -> Result<()>;

    async fn append_fused_state(&self, state: &FusedEmotionState) -> Result<()>;

    async fn append_assessment(&self, assessment: &PsychologicalAssessment) -> Result<()>;

    /// Fails with `Store` if an alert with the same id exists.
    async fn append_alert(&self, alert: &SystemAlert) -> Result<()>;

    /// Assessment with the greatest timestamp
    async fn latest_assessment(&self, session_id: SessionId)
        -> Result<Option<PsychologicalAssessment>>;

    /// Fused state with the greatest timestamp
    async fn latest_fused_state(&self, session_id: SessionId) -> Result<Option<FusedEmotionState>>;

    /// Events in timeline order
    async fn list_events(&self, session_id: SessionId) -> Result<Vec<ModalityEvent>>;

    /// Fused states in timestamp order
    async fn list_fused_states(&self, session_id: SessionId) -> Result<Vec<FusedEmotionState>>;

    /// Assessments in timestamp order
    async fn list_assessments(&self, session_id: SessionId) -> Result<Vec<PsychologicalAssessment>>;

    /// Alerts, newest first, optionally for one session
    async fn list_alerts(&self, session_id: Option<SessionId>) -> Result<Vec<SystemAlert>>;

    async fn get_alert(&self, id: Uuid) -> Result<Option<SystemAlert>>;

    /// Apply an alert status transition. Fails with `AlertNotFound` or
    /// `InvalidAlertTransition`.
    async fn set_alert_status(&self, id: Uuid, status: AlertStatus, at: Timestamp)
        -> Result<SystemAlert>;
}
