//! Session Orchestrator
//!
//! Drives one analysis session through its stages:
//!
//! 1. **Processing**: sort and filter the submitted units
//! 2. **Analyzing**: the three modalities concurrently, items sequentially
//! 3. **Fusing**: align every accepted event and fuse each bucket
//! 4. **Assessing**: assess fused states in time order, then raise alerts
//!    from the latest assessment
//!
//! Failures are handled at three levels. A failed item is skipped and
//! counted; a failed modality is left out of fusion; anything else moves the
//! session to `Failed` and is returned to the caller.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::alert::{AlertEmitter, SystemAlert};
use crate::analyzer::{
    validate_facial, validate_speech, validate_text, Analyzers, AudioSegment, TextUnit, VideoFrame,
};
use crate::assessment::{Assessor, PsychologicalAssessment, RiskEngine};
use crate::config::PipelineConfig;
use crate::error::{AffectError, Result, ResultExt};
use crate::fusion::{FusedEmotionState, FusionEngine};
use crate::modality::{Modality, ModalityEvent};
use crate::session::{AnalysisSession, SessionId, SessionStatus};
use crate::store::RecordStore;
use crate::timeline::align_events;
use crate::types::now;

/// Units submitted for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionInput {
    pub frames: Vec<VideoFrame>,
    pub audio: Vec<AudioSegment>,
    pub text: Vec<TextUnit>,
}

impl SessionInput {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && self.audio.is_empty() && self.text.is_empty()
    }
}

/// A request to analyze one session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRequest {
    #[serde(default)]
    pub case_ref: Option<String>,
    #[serde(default)]
    pub subject_ref: Option<String>,
    #[serde(default)]
    pub input: SessionInput,
}

/// Sort each modality by time and drop units that cannot be analyzed:
/// blank text and audio whose end precedes its start.
pub fn preprocess(mut input: SessionInput) -> SessionInput {
    input.frames.sort_by_key(|f| f.timestamp);

    let audio_before = input.audio.len();
    input.audio.retain(|a| a.end >= a.start);
    input.audio.sort_by_key(|a| a.start);

    let text_before = input.text.len();
    input.text.retain(|t| !t.content.trim().is_empty());
    input.text.sort_by_key(|t| t.timestamp);

    debug!(
        frames = input.frames.len(),
        audio = input.audio.len(),
        text = input.text.len(),
        dropped_audio = audio_before - input.audio.len(),
        dropped_text = text_before - input.text.len(),
        "Preprocessed session input"
    );
    input
}

/// Result of analyzing one unit
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Analyzed(Vec<ModalityEvent>),
    Skipped { index: usize, reason: String },
}

/// A unit the analyzer could not turn into events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub index: usize,
    pub reason: String,
}

/// Everything one modality produced for a session
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub modality: Modality,
    pub events: Vec<ModalityEvent>,
    pub skipped: Vec<SkippedItem>,
}

impl BatchResult {
    pub fn new(modality: Modality) -> Self {
        Self {
            modality,
            events: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            modality: self.modality,
            events: self.events.len(),
            skipped: self.skipped.clone(),
            error: None,
        }
    }
}

/// Per-modality report returned with a session outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub modality: Modality,
    pub events: usize,
    pub skipped: Vec<SkippedItem>,
    /// Set when the whole modality was left out
    pub error: Option<String>,
}

/// What a completed session produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub session: AnalysisSession,
    pub analysis: Vec<BatchSummary>,
    pub fused_states: Vec<FusedEmotionState>,
    pub assessments: Vec<PsychologicalAssessment>,
    pub alerts: Vec<SystemAlert>,
}

/// Runs sessions against injected analyzers and a record store
#[derive(Debug)]
pub struct SessionOrchestrator {
    analyzers: Analyzers,
    store: Arc<dyn RecordStore>,
    fusion: FusionEngine,
    assessor: Assessor,
    emitter: AlertEmitter,
}

impl SessionOrchestrator {
    pub fn new(analyzers: Analyzers, store: Arc<dyn RecordStore>, config: PipelineConfig) -> Self {
        Self {
            analyzers,
            store,
            fusion: FusionEngine::new(config.fusion),
            assessor: Assessor::new(RiskEngine::new(config.risk)),
            emitter: AlertEmitter::new(config.alerts.policy),
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Run one session to completion.
    ///
    /// On error the session is stored as `Failed` with the error message, and
    /// the error is returned.
    pub async fn run(&self, request: SessionRequest) -> Result<SessionOutcome> {
        let mut session = AnalysisSession::new(request.case_ref, request.subject_ref, now());
        info!(session = %session.id, "Starting analysis session");

        match self.drive(&mut session, request.input).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(session = %session.id, status = %session.status, error = %e, "Analysis session failed");
                self.record_failure(&mut session, &e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Re-raise alerts from a session's stored latest assessment.
    ///
    /// Under [`AlertPolicy::DedupeActive`](crate::alert::AlertPolicy) a risk that
    /// still has an active alert is skipped, so only acknowledged or resolved
    /// risks come back. The session's status is left untouched.
    pub async fn refresh_alerts(&self, session_id: SessionId) -> Result<Vec<SystemAlert>> {
        self.store
            .get_session(session_id)
            .await?
            .ok_or(AffectError::SessionNotFound(session_id))?;
        let latest = self
            .store
            .latest_assessment(session_id)
            .await
            .context("Loading latest assessment")?;

        let alerts = self.raise_alerts(session_id, latest.as_ref()).await?;
        info!(session = %session_id, alerts = alerts.len(), "Alerts refreshed");
        Ok(alerts)
    }

    async fn record_failure(&self, session: &mut AnalysisSession, message: &str) {
        if let Err(e) = session.fail(message, now()) {
            warn!(session = %session.id, error = %e, "Could not mark session failed");
            return;
        }
        if let Err(e) = self.store.update_session(session).await {
            error!(session = %session.id, error = %e, "Could not persist failed session");
        }
    }

    /// Persist the next status before adopting it, so a failed write leaves
    /// the session in its last stored stage.
    async fn advance(&self, session: &mut AnalysisSession, to: SessionStatus) -> Result<()> {
        let mut next = session.clone();
        next.transition(to, now())?;
        self.store
            .update_session(&next)
            .await
            .with_context(|| format!("Persisting session status {to}"))?;
        *session = next;
        info!(session = %session.id, status = %to, progress = session.progress(), "Session advanced");
        Ok(())
    }

    async fn drive(
        &self,
        session: &mut AnalysisSession,
        input: SessionInput,
    ) -> Result<SessionOutcome> {
        self.store
            .create_session(session)
            .await
            .context("Creating session")?;
        let session_id = session.id;

        self.advance(session, SessionStatus::Processing).await?;
        let input = preprocess(input);

        self.advance(session, SessionStatus::Analyzing).await?;
        let (batches, analysis) = self.analyze(session_id, &input).await;

        self.advance(session, SessionStatus::Fusing).await?;
        let fused_states = self.fuse(session_id, &batches).await?;

        self.advance(session, SessionStatus::Assessing).await?;
        let assessments = self.assessor.assess_all(&fused_states, None);
        for assessment in &assessments {
            self.store
                .append_assessment(assessment)
                .await
                .context("Appending assessment")?;
        }
        let alerts = self.raise_alerts(session_id, assessments.last()).await?;

        self.advance(session, SessionStatus::Completed).await?;
        info!(
            session = %session_id,
            fused = fused_states.len(),
            assessments = assessments.len(),
            alerts = alerts.len(),
            "Analysis session completed"
        );

        Ok(SessionOutcome {
            session: session.clone(),
            analysis,
            fused_states,
            assessments,
            alerts,
        })
    }

    /// Run the three modalities concurrently. A failed modality is logged and
    /// left out of the returned batches.
    async fn analyze(
        &self,
        session_id: SessionId,
        input: &SessionInput,
    ) -> (Vec<BatchResult>, Vec<BatchSummary>) {
        let facial = &self.analyzers.facial;
        let speech = &self.analyzers.speech;
        let text = &self.analyzers.text;

        let (facial_batch, speech_batch, text_batch) = tokio::join!(
            self.run_batch(session_id, Modality::Facial, &input.frames, |frame| async move {
                let payload = facial
                    .analyze_frame(frame)
                    .await?
                    .into_payload(Modality::Facial)?;
                validate_facial(frame, payload)
            }),
            self.run_batch(session_id, Modality::Speech, &input.audio, |segment| async move {
                let payload = speech
                    .analyze_segment(segment)
                    .await?
                    .into_payload(Modality::Speech)?;
                validate_speech(segment, payload).map(|e| vec![e])
            }),
            self.run_batch(session_id, Modality::Text, &input.text, |unit| async move {
                let payload = text
                    .analyze_snippet(unit)
                    .await?
                    .into_payload(Modality::Text)?;
                validate_text(unit, payload).map(|e| vec![e])
            }),
        );

        let mut batches = Vec::with_capacity(3);
        let mut analysis = Vec::with_capacity(3);
        for (modality, result) in [
            (Modality::Facial, facial_batch),
            (Modality::Speech, speech_batch),
            (Modality::Text, text_batch),
        ] {
            match result {
                Ok(batch) => {
                    analysis.push(batch.summary());
                    batches.push(batch);
                }
                Err(e) => {
                    error!(session = %session_id, %modality, error = %e, "Modality analysis failed; leaving it out");
                    analysis.push(BatchSummary {
                        modality,
                        events: 0,
                        skipped: Vec::new(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        (batches, analysis)
    }

    /// Analyze items one at a time. Item failures become skips; a store
    /// failure fails the whole modality.
    async fn run_batch<'a, T, F, Fut>(
        &self,
        session_id: SessionId,
        modality: Modality,
        items: &'a [T],
        analyze: F,
    ) -> Result<BatchResult>
    where
        F: Fn(&'a T) -> Fut,
        Fut: Future<Output = Result<Vec<ModalityEvent>>>,
    {
        let mut batch = BatchResult::new(modality);

        for (index, item) in items.iter().enumerate() {
            let outcome = match analyze(item).await {
                Ok(events) => ItemOutcome::Analyzed(events),
                Err(e) => ItemOutcome::Skipped {
                    index,
                    reason: e.to_string(),
                },
            };

            match outcome {
                ItemOutcome::Analyzed(events) => {
                    for event in events {
                        self.store
                            .append_event(session_id, &event)
                            .await
                            .with_context(|| format!("Appending {modality} event"))?;
                        batch.events.push(event);
                    }
                }
                ItemOutcome::Skipped { index, reason } => {
                    warn!(session = %session_id, %modality, index, %reason, "Skipping item");
                    batch.skipped.push(SkippedItem { index, reason });
                }
            }
        }

        debug!(
            session = %session_id,
            %modality,
            events = batch.events.len(),
            skipped = batch.skipped.len(),
            "Modality analysis finished"
        );
        Ok(batch)
    }

    async fn fuse(
        &self,
        session_id: SessionId,
        batches: &[BatchResult],
    ) -> Result<Vec<FusedEmotionState>> {
        let timeline = align_events(batches.iter().flat_map(|b| b.events.iter()));
        debug!(session = %session_id, buckets = timeline.len(), "Aligned timeline");

        let mut states: Vec<FusedEmotionState> = timeline
            .buckets()
            .iter()
            .map(|bucket| {
                FusedEmotionState::new(session_id, bucket.timestamp, self.fusion.fuse(bucket))
            })
            .collect();
        states.sort_by_key(|s| s.timestamp);

        for state in &states {
            self.store
                .append_fused_state(state)
                .await
                .context("Appending fused state")?;
        }
        Ok(states)
    }

    async fn raise_alerts(
        &self,
        session_id: SessionId,
        latest: Option<&PsychologicalAssessment>,
    ) -> Result<Vec<SystemAlert>> {
        let existing = self
            .store
            .list_alerts(Some(session_id))
            .await
            .context("Loading existing alerts")?;
        let alerts = self.emitter.emit(session_id, latest, &existing, now());

        for alert in &alerts {
            warn!(
                session = %session_id,
                alert_type = %alert.alert_type,
                severity = %alert.severity,
                "{}",
                alert.title
            );
            self.store
                .append_alert(alert)
                .await
                .context("Appending alert")?;
        }
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertPolicy, AlertStatus};
    use crate::analyzer::{
        AnalyzerResponse, DetectedExpression, FacialAnalyzer, FacialDetection, SpeechAnalyzer,
        SpeechDetection, TextAnalyzer, TextDetection,
    };
    use crate::assessment::RiskType;
    use crate::store::MemoryStore;
    use crate::types::Timestamp;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn t(secs: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    /// Reads the expression from the frame's `source`; "error" and
    /// "unsuccessful" simulate the two failure shapes.
    #[derive(Debug)]
    struct LabelFacial;

    #[async_trait]
    impl FacialAnalyzer for LabelFacial {
        async fn analyze_frame(&self, frame: &VideoFrame) -> Result<AnalyzerResponse<FacialDetection>> {
            match frame.source.as_deref() {
                Some("error") => Err(AffectError::analyzer(Modality::Facial, "connection reset")),
                Some("unsuccessful") => Ok(AnalyzerResponse::failed("no face found")),
                Some(label) => Ok(AnalyzerResponse::ok(FacialDetection {
                    events: vec![DetectedExpression {
                        expression: label.to_string(),
                        intensity: 1.0,
                        confidence: 1.0,
                        region: None,
                    }],
                })),
                None => Ok(AnalyzerResponse::ok(FacialDetection::default())),
            }
        }
    }

    /// Always anxious, after a delay so it finishes last
    #[derive(Debug)]
    struct SlowSpeech {
        delay_ms: u64,
    }

    #[async_trait]
    impl SpeechAnalyzer for SlowSpeech {
        async fn analyze_segment(
            &self,
            _segment: &AudioSegment,
        ) -> Result<AnalyzerResponse<SpeechDetection>> {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            Ok(AnalyzerResponse::ok(SpeechDetection {
                emotion: "anxious".into(),
                intensity: 1.0,
                confidence: 1.0,
                acoustic_features: BTreeMap::new(),
            }))
        }
    }

    /// Polarity is the unit's content
    #[derive(Debug)]
    struct EchoText;

    #[async_trait]
    impl TextAnalyzer for EchoText {
        async fn analyze_snippet(&self, unit: &TextUnit) -> Result<AnalyzerResponse<TextDetection>> {
            Ok(AnalyzerResponse::ok(TextDetection {
                polarity: unit.content.clone(),
                emotion: None,
                intensity: 1.0,
                confidence: 1.0,
                keywords: Vec::new(),
            }))
        }
    }

    fn analyzers() -> Analyzers {
        Analyzers::new(
            Arc::new(LabelFacial),
            Arc::new(SlowSpeech { delay_ms: 20 }),
            Arc::new(EchoText),
        )
    }

    fn frame(secs: i64, label: &str) -> VideoFrame {
        VideoFrame {
            timestamp: t(secs),
            frame_index: Some(secs as u64),
            source: Some(label.to_string()),
        }
    }

    fn audio(start: i64, end: i64) -> AudioSegment {
        AudioSegment {
            start: t(start),
            end: t(end),
            speaker_id: None,
            source: None,
        }
    }

    fn text(secs: i64, content: &str) -> TextUnit {
        TextUnit {
            timestamp: t(secs),
            content: content.to_string(),
            speaker_id: None,
        }
    }

    fn request(input: SessionInput) -> SessionRequest {
        SessionRequest {
            case_ref: Some("case-1".into()),
            subject_ref: None,
            input,
        }
    }

    fn orchestrator(store: Arc<dyn RecordStore>) -> SessionOrchestrator {
        SessionOrchestrator::new(analyzers(), store, PipelineConfig::default())
    }

    #[test]
    fn test_preprocess_sorts_and_filters() {
        let input = SessionInput {
            frames: vec![frame(5, "fear"), frame(1, "anger")],
            audio: vec![audio(8, 9), audio(4, 2), audio(3, 3)],
            text: vec![text(7, "positive"), text(2, "   "), text(1, "negative")],
        };
        let out = preprocess(input);

        let frame_times: Vec<_> = out.frames.iter().map(|f| f.timestamp).collect();
        assert_eq!(frame_times, vec![t(1), t(5)]);

        let audio_starts: Vec<_> = out.audio.iter().map(|a| a.start).collect();
        assert_eq!(audio_starts, vec![t(3), t(8)]);

        let texts: Vec<_> = out.text.iter().map(|u| u.content.as_str()).collect();
        assert_eq!(texts, vec!["negative", "positive"]);
    }

    #[tokio::test]
    async fn test_full_session_completes() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(store.clone());

        let outcome = orch
            .run(request(SessionInput {
                frames: vec![frame(0, "fear"), frame(2, "happiness")],
                audio: vec![audio(1, 3)],
                text: vec![text(0, "negative")],
            }))
            .await
            .unwrap();

        assert_eq!(outcome.session.status, SessionStatus::Completed);
        assert_eq!(outcome.session.progress(), 100);
        assert!(outcome.session.ended_at.is_some());

        let stamps: Vec<_> = outcome.fused_states.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![t(0), t(1), t(2)]);
        assert_eq!(outcome.fused_states[0].modalities_count, 2);
        assert_eq!(outcome.assessments.len(), 3);

        let stored = store.get_session(outcome.session.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
        assert_eq!(stored.case_ref.as_deref(), Some("case-1"));
        assert_eq!(store.list_events(stored.id).await.unwrap().len(), 4);
        assert_eq!(store.list_fused_states(stored.id).await.unwrap().len(), 3);
        assert_eq!(store.list_assessments(stored.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_slow_modality_still_yields_time_ordered_assessments() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(store.clone());

        // speech holds the earliest timestamps but completes last
        let outcome = orch
            .run(request(SessionInput {
                frames: vec![frame(10, "happiness"), frame(12, "fear")],
                audio: vec![audio(0, 2), audio(4, 6)],
                text: vec![],
            }))
            .await
            .unwrap();

        let stamps: Vec<_> = outcome.assessments.iter().map(|a| a.timestamp).collect();
        assert_eq!(stamps, vec![t(0), t(4), t(10), t(12)]);
        assert_eq!(
            outcome.assessments,
            Assessor::default().assess_all(&outcome.fused_states, None)
        );

        let stored: Vec<_> = store
            .list_assessments(outcome.session.id)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.timestamp)
            .collect();
        assert_eq!(stored, stamps);
    }

    #[tokio::test]
    async fn test_failed_items_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(store.clone());

        let outcome = orch
            .run(request(SessionInput {
                frames: vec![
                    frame(0, "anger"),
                    frame(1, "error"),
                    frame(2, "unsuccessful"),
                    frame(3, " "),
                ],
                audio: vec![],
                text: vec![],
            }))
            .await
            .unwrap();

        let facial = outcome
            .analysis
            .iter()
            .find(|s| s.modality == Modality::Facial)
            .unwrap();
        assert_eq!(facial.events, 1);
        let skipped: Vec<usize> = facial.skipped.iter().map(|s| s.index).collect();
        assert_eq!(skipped, vec![1, 2, 3]);
        assert!(facial.skipped[0].reason.contains("connection reset"));
        assert!(facial.skipped[1].reason.contains("no face found"));
        assert_eq!(outcome.fused_states.len(), 1);
        assert_eq!(outcome.session.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_alerts_come_from_latest_assessment_only() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(store.clone());

        // fear raises risks, then a calm-enough happy reading follows
        let outcome = orch
            .run(request(SessionInput {
                frames: vec![frame(0, "fear"), frame(1, "happiness")],
                ..Default::default()
            }))
            .await
            .unwrap();
        assert!(!outcome.assessments[0].risks.is_empty());
        assert!(outcome.assessments[1].risks.is_empty());
        assert!(outcome.alerts.is_empty());

        // reversed, the latest reading carries the risks
        let outcome = orch
            .run(request(SessionInput {
                frames: vec![frame(0, "neutral"), frame(1, "fear")],
                ..Default::default()
            }))
            .await
            .unwrap();
        let latest = outcome.assessments.last().unwrap();
        let alert_types: Vec<RiskType> = outcome.alerts.iter().map(|a| a.alert_type).collect();
        let risk_types: Vec<RiskType> = latest.risks.iter().map(|r| r.risk_type).collect();
        assert_eq!(alert_types, risk_types);
        assert!(risk_types.contains(&RiskType::SharpEmotionalSwing));
        assert!(outcome.alerts.iter().all(|a| a.status == AlertStatus::Active));

        let stored = store.list_alerts(Some(outcome.session.id)).await.unwrap();
        assert_eq!(stored.len(), outcome.alerts.len());
    }

    #[tokio::test]
    async fn test_alerts_are_stamped_when_raised() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(store.clone());

        let recent = orch
            .run(request(SessionInput {
                frames: vec![frame(600, "neutral"), frame(601, "fear")],
                ..Default::default()
            }))
            .await
            .unwrap();
        // an older recording analyzed afterwards
        let older = orch
            .run(request(SessionInput {
                frames: vec![frame(0, "neutral"), frame(1, "fear")],
                ..Default::default()
            }))
            .await
            .unwrap();

        for outcome in [&recent, &older] {
            assert!(!outcome.alerts.is_empty());
            for alert in &outcome.alerts {
                assert!(alert.created_at >= outcome.session.started_at);
                assert!(alert.created_at > outcome.assessments.last().unwrap().timestamp);
            }
        }
        let latest = older.assessments.last().unwrap();
        assert!(latest.risks.iter().all(|r| r.timestamp == t(1)));

        let feed = store.list_alerts(None).await.unwrap();
        assert_eq!(feed[0].session_id, older.session.id);
        assert_eq!(feed.last().unwrap().session_id, recent.session.id);
    }

    #[tokio::test]
    async fn test_refresh_alerts_follows_policy() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(store.clone());
        let outcome = orch
            .run(request(SessionInput {
                frames: vec![frame(0, "neutral"), frame(1, "fear")],
                ..Default::default()
            }))
            .await
            .unwrap();
        let session_id = outcome.session.id;
        let raised = outcome.alerts.len();
        assert!(raised >= 2);

        // every risk still has an active alert
        assert!(orch.refresh_alerts(session_id).await.unwrap().is_empty());

        let acked = &outcome.alerts[0];
        store
            .set_alert_status(acked.id, AlertStatus::Acknowledged, Utc::now())
            .await
            .unwrap();
        let again = orch.refresh_alerts(session_id).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].alert_type, acked.alert_type);
        assert_eq!(again[0].status, AlertStatus::Active);
        assert!(again[0].created_at >= acked.created_at);

        let always = SessionOrchestrator::new(
            analyzers(),
            store.clone(),
            PipelineConfig::default().with_alert_policy(AlertPolicy::AlwaysEmit),
        );
        assert_eq!(always.refresh_alerts(session_id).await.unwrap().len(), raised);
        assert_eq!(
            store.list_alerts(Some(session_id)).await.unwrap().len(),
            2 * raised + 1
        );

        let stored = store.get_session(session_id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);

        assert!(matches!(
            orch.refresh_alerts(Uuid::new_v4()).await,
            Err(AffectError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_input_completes_without_assessments() {
        let store = Arc::new(MemoryStore::new());
        let outcome = orchestrator(store)
            .run(request(SessionInput::default()))
            .await
            .unwrap();
        assert_eq!(outcome.session.status, SessionStatus::Completed);
        assert!(outcome.fused_states.is_empty());
        assert!(outcome.alerts.is_empty());
    }

    /// Delegates to a MemoryStore but can be told to fail specific writes
    #[derive(Debug, Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_fused_states: bool,
        fail_text_events: bool,
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn create_session(&self, session: &AnalysisSession) -> Result<()> {
            self.inner.create_session(session).await
        }
        async fn update_session(&self, session: &AnalysisSession) -> Result<()> {
            self.inner.update_session(session).await
        }
        async fn get_session(&self, id: SessionId) -> Result<Option<AnalysisSession>> {
            self.inner.get_session(id).await
        }
        async fn append_event(&self, session_id: SessionId, event: &ModalityEvent) -> Result<()> {
            if self.fail_text_events && event.modality() == Modality::Text {
                return Err(AffectError::Store("text table locked".into()));
            }
            self.inner.append_event(session_id, event).await
        }
        async fn append_fused_state(&self, state: &FusedEmotionState) -> Result<()> {
            if self.fail_fused_states {
                return Err(AffectError::Store("disk full".into()));
            }
            self.inner.append_fused_state(state).await
        }
        async fn append_assessment(&self, assessment: &PsychologicalAssessment) -> Result<()> {
            self.inner.append_assessment(assessment).await
        }
        async fn append_alert(&self, alert: &SystemAlert) -> Result<()> {
            self.inner.append_alert(alert).await
        }
        async fn latest_assessment(
            &self,
            session_id: SessionId,
        ) -> Result<Option<PsychologicalAssessment>> {
            self.inner.latest_assessment(session_id).await
        }
        async fn latest_fused_state(
            &self,
            session_id: SessionId,
        ) -> Result<Option<FusedEmotionState>> {
            self.inner.latest_fused_state(session_id).await
        }
        async fn list_events(&self, session_id: SessionId) -> Result<Vec<ModalityEvent>> {
            self.inner.list_events(session_id).await
        }
        async fn list_fused_states(&self, session_id: SessionId) -> Result<Vec<FusedEmotionState>> {
            self.inner.list_fused_states(session_id).await
        }
        async fn list_assessments(
            &self,
            session_id: SessionId,
        ) -> Result<Vec<PsychologicalAssessment>> {
            self.inner.list_assessments(session_id).await
        }
        async fn list_alerts(&self, session_id: Option<SessionId>) -> Result<Vec<SystemAlert>> {
            self.inner.list_alerts(session_id).await
        }
        async fn get_alert(&self, id: Uuid) -> Result<Option<SystemAlert>> {
            self.inner.get_alert(id).await
        }
        async fn set_alert_status(
            &self,
            id: Uuid,
            status: AlertStatus,
            at: Timestamp,
        ) -> Result<SystemAlert> {
            self.inner.set_alert_status(id, status, at).await
        }
    }

    #[tokio::test]
    async fn test_store_failure_fails_session() {
        let store = Arc::new(FlakyStore {
            fail_fused_states: true,
            ..Default::default()
        });
        let orch = orchestrator(store.clone());

        let err = orch
            .run(request(SessionInput {
                frames: vec![frame(0, "fear")],
                ..Default::default()
            }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert!(err.to_string().starts_with("Appending fused state"));
        assert!(store.list_alerts(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_session_is_persisted_with_message() {
        let store = Arc::new(FlakyStore {
            fail_fused_states: true,
            ..Default::default()
        });
        let orch = orchestrator(store.clone());
        let input = SessionInput {
            frames: vec![frame(0, "anger")],
            ..Default::default()
        };

        let mut session = AnalysisSession::new(None, None, now());
        let err = orch.drive(&mut session, input).await.unwrap_err();
        orch.record_failure(&mut session, &err.to_string()).await;

        let stored = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Failed);
        assert_eq!(stored.progress(), 0);
        assert!(stored.ended_at.is_some());
        assert!(stored.error_message.unwrap().contains("disk full"));

        // events committed before the failure stay queryable
        assert_eq!(store.list_events(session.id).await.unwrap().len(), 1);

        // a second failure report does not move ended_at
        let ended = session.ended_at;
        orch.record_failure(&mut session, "late").await;
        assert_eq!(session.ended_at, ended);
        assert_ne!(session.error_message.as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn test_modality_failure_is_left_out() {
        let store = Arc::new(FlakyStore {
            fail_text_events: true,
            ..Default::default()
        });
        let orch = orchestrator(store.clone());

        let outcome = orch
            .run(request(SessionInput {
                frames: vec![frame(0, "anger")],
                audio: vec![],
                text: vec![text(5, "negative")],
            }))
            .await
            .unwrap();

        assert_eq!(outcome.session.status, SessionStatus::Completed);
        let text_summary = outcome
            .analysis
            .iter()
            .find(|s| s.modality == Modality::Text)
            .unwrap();
        assert!(text_summary.error.as_deref().unwrap().contains("text table locked"));

        // only the facial bucket was fused
        let stamps: Vec<_> = outcome.fused_states.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![t(0)]);
    }
}
