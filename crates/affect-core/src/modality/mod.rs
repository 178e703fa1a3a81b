//! Modality events and their label vocabularies
//!
//! Three independent signal sources feed the pipeline. Each produces its own
//! immutable event type; [`ModalityEvent`] tags them so stores and the
//! aligner can carry a single stream.

mod events;

pub use events::{
    FacialExpressionEvent, ModalityEvent, SpeechEmotionSegment, TextSentimentSnippet,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three signal sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Facial,
    Speech,
    Text,
}

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::Facial, Modality::Speech, Modality::Text];

    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Facial => "facial",
            Modality::Speech => "speech",
            Modality::Text => "text",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facial micro-expression label
///
/// Labels outside the known vocabulary are kept verbatim in `Other` so they
/// survive persistence; fusion treats them as affect-neutral.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FacialExpression {
    Anger,
    Fear,
    Surprise,
    Sadness,
    Happiness,
    Disgust,
    Neutral,
    Other(String),
}

impl FacialExpression {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "anger" => Self::Anger,
            "fear" => Self::Fear,
            "surprise" => Self::Surprise,
            "sadness" => Self::Sadness,
            "happiness" => Self::Happiness,
            "disgust" => Self::Disgust,
            "neutral" => Self::Neutral,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Anger => "anger",
            Self::Fear => "fear",
            Self::Surprise => "surprise",
            Self::Sadness => "sadness",
            Self::Happiness => "happiness",
            Self::Disgust => "disgust",
            Self::Neutral => "neutral",
            Self::Other(label) => label,
        }
    }
}

/// Speech emotion label
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SpeechEmotion {
    Angry,
    Anxious,
    Calm,
    Excited,
    Neutral,
    Other(String),
}

impl SpeechEmotion {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "angry" => Self::Angry,
            "anxious" => Self::Anxious,
            "calm" => Self::Calm,
            "excited" => Self::Excited,
            "neutral" => Self::Neutral,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Angry => "angry",
            Self::Anxious => "anxious",
            Self::Calm => "calm",
            Self::Excited => "excited",
            Self::Neutral => "neutral",
            Self::Other(label) => label,
        }
    }
}

/// Text sentiment polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
}

impl Polarity {
    /// Unrecognised polarities fall back to neutral.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            _ => Self::Neutral,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

macro_rules! string_label {
    ($ty:ty) => {
        impl From<String> for $ty {
            fn from(s: String) -> Self {
                <$ty>::parse(&s)
            }
        }

        impl From<$ty> for String {
            fn from(label: $ty) -> Self {
                label.as_str().to_string()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_label!(FacialExpression);
string_label!(SpeechEmotion);

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
