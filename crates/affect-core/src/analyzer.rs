//! Modality analyzer seam
//!
//! Analyzers live outside this crate. The pipeline sees them only through
//! the three async traits below and their [`AnalyzerResponse`] contract.
//! Payloads are loosely typed on the way in and validated into
//! [`ModalityEvent`]s by the `validate_*` functions, so nothing downstream
//! ever handles an unchecked label or score.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{AffectError, Result};
use crate::modality::{
    FacialExpression, FacialExpressionEvent, Modality, ModalityEvent, Polarity, SpeechEmotion,
    SpeechEmotionSegment, TextSentimentSnippet,
};
use crate::types::Timestamp;

/// One video frame submitted for micro-expression analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFrame {
    pub timestamp: Timestamp,
    #[serde(default)]
    pub frame_index: Option<u64>,
    /// Opaque locator understood by the analyzer
    #[serde(default)]
    pub source: Option<String>,
}

/// One audio segment submitted for speech-emotion analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSegment {
    pub start: Timestamp,
    pub end: Timestamp,
    #[serde(default)]
    pub speaker_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// One piece of transcript text submitted for sentiment analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextUnit {
    pub timestamp: Timestamp,
    pub content: String,
    #[serde(default)]
    pub speaker_id: Option<String>,
}

/// Envelope every analyzer answers with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerResponse<P> {
    pub success: bool,
    pub payload: Option<P>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<P> AnalyzerResponse<P> {
    pub fn ok(payload: P) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(error.into()),
        }
    }

    /// The payload of a successful response, or why there is none.
    pub fn into_payload(self, modality: Modality) -> Result<P> {
        if !self.success {
            let message = self.error.unwrap_or_else(|| "analysis unsuccessful".to_string());
            return Err(AffectError::analyzer(modality, message));
        }
        self.payload
            .ok_or_else(|| AffectError::analyzer(modality, "response carried no payload"))
    }
}

/// A single expression reported for a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedExpression {
    #[serde(alias = "type")]
    pub expression: String,
    pub intensity: f64,
    pub confidence: f64,
    #[serde(default)]
    pub region: Option<String>,
}

/// Facial analyzer payload; a frame may yield zero or more expressions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacialDetection {
    #[serde(default)]
    pub events: Vec<DetectedExpression>,
}

/// Speech analyzer payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechDetection {
    #[serde(alias = "emotion_type")]
    pub emotion: String,
    pub intensity: f64,
    pub confidence: f64,
    #[serde(default)]
    pub acoustic_features: BTreeMap<String, f64>,
}

/// Text analyzer payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDetection {
    pub polarity: String,
    #[serde(default, alias = "emotion_type")]
    pub emotion: Option<String>,
    pub intensity: f64,
    pub confidence: f64,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[async_trait]
pub trait FacialAnalyzer: Send + Sync + std::fmt::Debug {
    async fn analyze_frame(&self, frame: &VideoFrame) -> Result<AnalyzerResponse<FacialDetection>>;
}

#[async_trait]
pub trait SpeechAnalyzer: Send + Sync + std::fmt::Debug {
    async fn analyze_segment(
        &self,
        segment: &AudioSegment,
    ) -> Result<AnalyzerResponse<SpeechDetection>>;
}

#[async_trait]
pub trait TextAnalyzer: Send + Sync + std::fmt::Debug {
    async fn analyze_snippet(&self, unit: &TextUnit) -> Result<AnalyzerResponse<TextDetection>>;
}

/// The three analyzers a session runs against
#[derive(Debug, Clone)]
pub struct Analyzers {
    pub facial: Arc<dyn FacialAnalyzer>,
    pub speech: Arc<dyn SpeechAnalyzer>,
    pub text: Arc<dyn TextAnalyzer>,
}

impl Analyzers {
    pub fn new(
        facial: Arc<dyn FacialAnalyzer>,
        speech: Arc<dyn SpeechAnalyzer>,
        text: Arc<dyn TextAnalyzer>,
    ) -> Self {
        Self {
            facial,
            speech,
            text,
        }
    }
}

fn require_label(modality: Modality, label: &str) -> Result<()> {
    if label.trim().is_empty() {
        return Err(AffectError::InvalidInput(format!(
            "{modality} analyzer returned an empty label"
        )));
    }
    Ok(())
}

/// Validate a facial payload into events stamped with the frame's time.
///
/// Blank expressions are dropped on their own; the frame is rejected only
/// when every reported expression is blank.
pub fn validate_facial(frame: &VideoFrame, detection: FacialDetection) -> Result<Vec<ModalityEvent>> {
    let reported = detection.events.len();
    let events: Vec<ModalityEvent> = detection
        .events
        .into_iter()
        .filter(|d| !d.expression.trim().is_empty())
        .map(|d| {
            let mut event = FacialExpressionEvent::new(
                frame.timestamp,
                FacialExpression::parse(&d.expression),
                d.intensity,
                d.confidence,
            );
            if let Some(index) = frame.frame_index {
                event = event.with_frame_index(index);
            }
            ModalityEvent::from(event)
        })
        .collect();

    if reported > 0 && events.is_empty() {
        return Err(AffectError::InvalidInput(format!(
            "{} analyzer returned only empty labels",
            Modality::Facial
        )));
    }
    if events.len() < reported {
        debug!(
            frame = ?frame.frame_index,
            dropped = reported - events.len(),
            "Dropped blank facial expressions"
        );
    }
    Ok(events)
}

/// Validate a speech payload into a segment spanning the submitted audio.
pub fn validate_speech(segment: &AudioSegment, detection: SpeechDetection) -> Result<ModalityEvent> {
    require_label(Modality::Speech, &detection.emotion)?;

    let mut event = SpeechEmotionSegment::new(
        segment.start,
        segment.end,
        SpeechEmotion::parse(&detection.emotion),
        detection.intensity,
        detection.confidence,
    );
    let features: BTreeMap<String, f64> = detection
        .acoustic_features
        .into_iter()
        .filter(|(_, v)| v.is_finite())
        .collect();
    if !features.is_empty() {
        event = event.with_acoustic_features(features);
    }
    if let Some(speaker) = &segment.speaker_id {
        event = event.with_speaker(speaker.clone());
    }
    Ok(event.into())
}

/// Validate a text payload into a snippet carrying the submitted text.
pub fn validate_text(unit: &TextUnit, detection: TextDetection) -> Result<ModalityEvent> {
    require_label(Modality::Text, &detection.polarity)?;

    let mut event = TextSentimentSnippet::new(
        unit.timestamp,
        unit.content.clone(),
        Polarity::parse(&detection.polarity),
        detection.intensity,
        detection.confidence,
    )
    .with_keywords(detection.keywords);
    if let Some(emotion) = detection.emotion.filter(|e| !e.trim().is_empty()) {
        event = event.with_emotion(emotion);
    }
    Ok(event.into())
}
