//! Analysis session and its status machine

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{AffectError, Result};
use crate::types::Timestamp;

/// Session identifier
pub type SessionId = Uuid;

/// Stage of an analysis session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Initializing,
    Processing,
    Analyzing,
    Fusing,
    Assessing,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (Initializing, Processing)
            | (Processing, Analyzing)
            | (Analyzing, Fusing)
            | (Fusing, Assessing)
            | (Assessing, Completed) => true,
            (Completed, _) | (Failed, _) => false,
            (_, Failed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }

    /// Coarse progress percentage for status displays
    pub fn progress(self) -> u8 {
        match self {
            SessionStatus::Initializing => 0,
            SessionStatus::Processing => 20,
            SessionStatus::Analyzing => 40,
            SessionStatus::Fusing => 60,
            SessionStatus::Assessing => 80,
            SessionStatus::Completed => 100,
            SessionStatus::Failed => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Initializing => "initializing",
            SessionStatus::Processing => "processing",
            SessionStatus::Analyzing => "analyzing",
            SessionStatus::Fusing => "fusing",
            SessionStatus::Assessing => "assessing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One analysis session over a set of recorded inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSession {
    pub id: SessionId,
    /// Opaque case reference
    pub case_ref: Option<String>,
    /// Opaque subject reference
    pub subject_ref: Option<String>,
    pub status: SessionStatus,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub error_message: Option<String>,
}

impl AnalysisSession {
    pub fn new(case_ref: Option<String>, subject_ref: Option<String>, started_at: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            case_ref,
            subject_ref,
            status: SessionStatus::Initializing,
            started_at,
            ended_at: None,
            error_message: None,
        }
    }

    pub fn progress(&self) -> u8 {
        self.status.progress()
    }

    /// Advance the status. Entering a terminal state stamps `ended_at`.
    pub fn transition(&mut self, to: SessionStatus, at: Timestamp) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(AffectError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }

        self.status = to;
        if to.is_terminal() && self.ended_at.is_none() {
            self.ended_at = Some(at);
        }
        Ok(())
    }

    /// Move to `Failed` and record why.
    pub fn fail(&mut self, message: impl Into<String>, at: Timestamp) -> Result<()> {
        self.transition(SessionStatus::Failed, at)?;
        self.error_message = Some(message.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    const FORWARD: [SessionStatus; 6] = [
        SessionStatus::Initializing,
        SessionStatus::Processing,
        SessionStatus::Analyzing,
        SessionStatus::Fusing,
        SessionStatus::Assessing,
        SessionStatus::Completed,
    ];

    #[test]
    fn test_happy_path() {
        let start = Utc::now();
        let mut session = AnalysisSession::new(Some("case-7".into()), None, start);
        assert_eq!(session.status, SessionStatus::Initializing);
        assert_eq!(session.progress(), 0);

        for (i, next) in FORWARD.iter().skip(1).enumerate() {
            session
                .transition(*next, start + Duration::seconds(i as i64 + 1))
                .unwrap();
        }
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.progress(), 100);
        assert_eq!(session.ended_at, Some(start + Duration::seconds(5)));
    }

    #[test]
    fn test_no_skipping_stages() {
        let mut session = AnalysisSession::new(None, None, Utc::now());
        let err = session
            .transition(SessionStatus::Fusing, Utc::now())
            .unwrap_err();
        assert!(matches!(err, AffectError::InvalidTransition { .. }));
        assert_eq!(session.status, SessionStatus::Initializing);
    }

    #[test]
    fn test_failed_reachable_from_every_non_terminal() {
        for status in FORWARD.iter().filter(|s| !s.is_terminal()) {
            assert!(status.can_transition_to(SessionStatus::Failed), "{status}");
        }
        assert!(!SessionStatus::Completed.can_transition_to(SessionStatus::Failed));
        assert!(!SessionStatus::Failed.can_transition_to(SessionStatus::Failed));
    }

    #[test]
    fn test_ended_at_set_once() {
        let start = Utc::now();
        let mut session = AnalysisSession::new(None, None, start);
        session.transition(SessionStatus::Processing, start).unwrap();
        session.fail("store unavailable", start + Duration::seconds(3)).unwrap();

        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(session.error_message.as_deref(), Some("store unavailable"));
        assert_eq!(session.ended_at, Some(start + Duration::seconds(3)));

        assert!(session.fail("again", start + Duration::seconds(9)).is_err());
        assert_eq!(session.ended_at, Some(start + Duration::seconds(3)));
        assert_eq!(session.error_message.as_deref(), Some("store unavailable"));
    }

    #[test]
    fn test_progress_table() {
        let values: Vec<u8> = FORWARD.iter().map(|s| s.progress()).collect();
        assert_eq!(values, vec![0, 20, 40, 60, 80, 100]);
        assert_eq!(SessionStatus::Failed.progress(), 0);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&SessionStatus::Assessing).unwrap();
        assert_eq!(json, "\"assessing\"");
    }
}
