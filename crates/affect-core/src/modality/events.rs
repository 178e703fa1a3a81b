//! Immutable per-modality events
//!
//! Intensity and confidence are clamped to [0, 1] on construction and on
//! deserialization, so every event in the system satisfies the bound.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use super::{FacialExpression, Modality, Polarity, SpeechEmotion};
use crate::types::{clamp_unit, Timestamp};

fn unit<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    f64::deserialize(deserializer).map(clamp_unit)
}

/// A facial micro-expression detected at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacialExpressionEvent {
    timestamp: Timestamp,
    expression: FacialExpression,
    #[serde(deserialize_with = "unit")]
    intensity: f64,
    #[serde(deserialize_with = "unit")]
    confidence: f64,
    #[serde(default)]
    frame_index: Option<u64>,
}

impl FacialExpressionEvent {
    pub fn new(
        timestamp: Timestamp,
        expression: FacialExpression,
        intensity: f64,
        confidence: f64,
    ) -> Self {
        Self {
            timestamp,
            expression,
            intensity: clamp_unit(intensity),
            confidence: clamp_unit(confidence),
            frame_index: None,
        }
    }

    pub fn with_frame_index(mut self, frame_index: u64) -> Self {
        self.frame_index = Some(frame_index);
        self
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn expression(&self) -> &FacialExpression {
        &self.expression
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn frame_index(&self) -> Option<u64> {
        self.frame_index
    }
}

/// A speech segment classified with one emotion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechEmotionSegment {
    start: Timestamp,
    end: Timestamp,
    emotion: SpeechEmotion,
    #[serde(deserialize_with = "unit")]
    intensity: f64,
    #[serde(deserialize_with = "unit")]
    confidence: f64,
    #[serde(default)]
    acoustic_features: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    speaker_id: Option<String>,
}

impl SpeechEmotionSegment {
    pub fn new(
        start: Timestamp,
        end: Timestamp,
        emotion: SpeechEmotion,
        intensity: f64,
        confidence: f64,
    ) -> Self {
        Self {
            start,
            end,
            emotion,
            intensity: clamp_unit(intensity),
            confidence: clamp_unit(confidence),
            acoustic_features: None,
            speaker_id: None,
        }
    }

    pub fn with_acoustic_features(mut self, features: BTreeMap<String, f64>) -> Self {
        self.acoustic_features = Some(features);
        self
    }

    pub fn with_speaker(mut self, speaker_id: impl Into<String>) -> Self {
        self.speaker_id = Some(speaker_id.into());
        self
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    pub fn emotion(&self) -> &SpeechEmotion {
        &self.emotion
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn acoustic_features(&self) -> Option<&BTreeMap<String, f64>> {
        self.acoustic_features.as_ref()
    }

    pub fn speaker_id(&self) -> Option<&str> {
        self.speaker_id.as_deref()
    }
}

/// A text snippet with sentiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSentimentSnippet {
    timestamp: Timestamp,
    text: String,
    polarity: Polarity,
    #[serde(default)]
    emotion: Option<String>,
    #[serde(deserialize_with = "unit")]
    intensity: f64,
    #[serde(deserialize_with = "unit")]
    confidence: f64,
    #[serde(default)]
    keywords: Vec<String>,
}

impl TextSentimentSnippet {
    pub fn new(
        timestamp: Timestamp,
        text: impl Into<String>,
        polarity: Polarity,
        intensity: f64,
        confidence: f64,
    ) -> Self {
        Self {
            timestamp,
            text: text.into(),
            polarity,
            emotion: None,
            intensity: clamp_unit(intensity),
            confidence: clamp_unit(confidence),
            keywords: Vec::new(),
        }
    }

    pub fn with_emotion(mut self, emotion: impl Into<String>) -> Self {
        self.emotion = Some(emotion.into());
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn emotion(&self) -> Option<&str> {
        self.emotion.as_deref()
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

/// Any modality event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "modality", rename_all = "lowercase")]
pub enum ModalityEvent {
    Facial(FacialExpressionEvent),
    Speech(SpeechEmotionSegment),
    Text(TextSentimentSnippet),
}

impl ModalityEvent {
    pub fn modality(&self) -> Modality {
        match self {
            ModalityEvent::Facial(_) => Modality::Facial,
            ModalityEvent::Speech(_) => Modality::Speech,
            ModalityEvent::Text(_) => Modality::Text,
        }
    }

    /// Timeline key: speech segments are keyed by their start.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            ModalityEvent::Facial(e) => e.timestamp(),
            ModalityEvent::Speech(e) => e.start(),
            ModalityEvent::Text(e) => e.timestamp(),
        }
    }
}

impl From<FacialExpressionEvent> for ModalityEvent {
    fn from(e: FacialExpressionEvent) -> Self {
        ModalityEvent::Facial(e)
    }
}

impl From<SpeechEmotionSegment> for ModalityEvent {
    fn from(e: SpeechEmotionSegment) -> Self {
        ModalityEvent::Speech(e)
    }
}

impl From<TextSentimentSnippet> for ModalityEvent {
    fn from(e: TextSentimentSnippet) -> Self {
        ModalityEvent::Text(e)
    }
}
