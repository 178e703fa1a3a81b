//! Fusion Engine - one activation/valence pair per timeline bucket
//!
//! Each present modality contributes its label's (activation, valence) point,
//! scaled by intensity and by an effective weight of `base_weight × confidence`.
//! The sums are divided by the total effective weight, giving a confidence-
//! and intensity-aware weighted average.
//!
//! # Example
//!
//! ```
//! use affect_core::fusion::{FusionEngine, FusionWeights};
//! use affect_core::timeline::{ModalitySummary, TimelineBucket};
//! use chrono::Utc;
//!
//! let mut bucket = TimelineBucket::empty(Utc::now());
//! bucket.facial = Some(ModalitySummary {
//!     label: "fear".to_string(),
//!     intensity: 0.8,
//!     confidence: 0.9,
//! });
//!
//! let fused = FusionEngine::new(FusionWeights::default()).fuse(&bucket);
//! assert!((fused.activation - 0.72).abs() < 1e-9);
//! assert!((fused.valence + 0.64).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::modality::{FacialExpression, Modality, Polarity, SpeechEmotion};
use crate::timeline::{ModalitySummary, TimelineBucket};
use crate::types::Timestamp;

/// A point on the activation/valence plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffectPoint {
    pub activation: f64,
    pub valence: f64,
}

impl AffectPoint {
    pub const NEUTRAL: AffectPoint = AffectPoint::new(0.0, 0.0);

    pub const fn new(activation: f64, valence: f64) -> Self {
        Self {
            activation,
            valence,
        }
    }
}

impl FacialExpression {
    pub fn affect(&self) -> AffectPoint {
        match self {
            Self::Anger => AffectPoint::new(0.8, -0.7),
            Self::Fear => AffectPoint::new(0.9, -0.8),
            Self::Surprise => AffectPoint::new(0.7, 0.1),
            Self::Sadness => AffectPoint::new(0.3, -0.6),
            Self::Happiness => AffectPoint::new(0.6, 0.8),
            Self::Disgust => AffectPoint::new(0.5, -0.6),
            Self::Neutral | Self::Other(_) => AffectPoint::NEUTRAL,
        }
    }
}

impl SpeechEmotion {
    pub fn affect(&self) -> AffectPoint {
        match self {
            Self::Angry => AffectPoint::new(0.8, -0.7),
            Self::Anxious => AffectPoint::new(0.7, -0.5),
            Self::Calm => AffectPoint::new(0.2, 0.3),
            Self::Excited => AffectPoint::new(0.9, 0.6),
            Self::Neutral | Self::Other(_) => AffectPoint::NEUTRAL,
        }
    }
}

impl Polarity {
    pub fn affect(self) -> AffectPoint {
        match self {
            Self::Positive => AffectPoint::new(0.4, 0.6),
            Self::Negative => AffectPoint::new(0.6, -0.6),
            Self::Neutral => AffectPoint::NEUTRAL,
        }
    }
}

/// Table lookup for a summary label of the given modality.
///
/// Text summaries carry the polarity. A text label outside the polarity
/// vocabulary maps to neutral, like every other unknown label.
fn label_affect(modality: Modality, label: &str) -> AffectPoint {
    match modality {
        Modality::Facial => FacialExpression::parse(label).affect(),
        Modality::Speech => SpeechEmotion::parse(label).affect(),
        Modality::Text => match label.trim().to_ascii_lowercase().as_str() {
            "positive" | "negative" => Polarity::parse(label).affect(),
            _ => AffectPoint::NEUTRAL,
        },
    }
}

/// Base weight per modality
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    pub facial: f64,
    pub speech: f64,
    pub text: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            facial: 0.4,
            speech: 0.3,
            text: 0.3,
        }
    }
}

impl FusionWeights {
    pub fn base(&self, modality: Modality) -> f64 {
        match modality {
            Modality::Facial => self.facial,
            Modality::Speech => self.speech,
            Modality::Text => self.text,
        }
    }
}

/// Output of fusing one bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusedVector {
    pub activation: f64,
    pub valence: f64,
    pub total_weight: f64,
    pub modalities_count: usize,
}

/// Fused state persisted for one timeline bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedEmotionState {
    pub session_id: Uuid,
    pub timestamp: Timestamp,
    pub activation: f64,
    pub valence: f64,
    pub total_weight: f64,
    pub modalities_count: usize,
}

impl FusedEmotionState {
    pub fn new(session_id: Uuid, timestamp: Timestamp, vector: FusedVector) -> Self {
        Self {
            session_id,
            timestamp,
            activation: vector.activation,
            valence: vector.valence,
            total_weight: vector.total_weight,
            modalities_count: vector.modalities_count,
        }
    }

    pub fn affect(&self) -> AffectPoint {
        AffectPoint::new(self.activation, self.valence)
    }
}

/// Weighted fusion of a bucket's modality summaries
#[derive(Debug, Clone, Default)]
pub struct FusionEngine {
    weights: FusionWeights,
}

impl FusionEngine {
    pub fn new(weights: FusionWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &FusionWeights {
        &self.weights
    }

    /// Fuse one bucket. A bucket with zero total weight yields (0, 0).
    pub fn fuse(&self, bucket: &TimelineBucket) -> FusedVector {
        let mut activation = 0.0;
        let mut valence = 0.0;
        let mut total_weight = 0.0;
        let mut modalities_count = 0;

        for modality in Modality::ALL {
            let Some(summary) = bucket.get(modality) else {
                continue;
            };
            let (contribution, weight) = self.contribution(modality, summary);
            activation += contribution.activation;
            valence += contribution.valence;
            total_weight += weight;
            modalities_count += 1;
        }

        if total_weight > 0.0 {
            activation /= total_weight;
            valence /= total_weight;
        } else {
            activation = 0.0;
            valence = 0.0;
        }

        FusedVector {
            activation,
            valence,
            total_weight,
            modalities_count,
        }
    }

    fn contribution(&self, modality: Modality, summary: &ModalitySummary) -> (AffectPoint, f64) {
        let weight = self.weights.base(modality) * summary.confidence;
        let point = label_affect(modality, &summary.label);
        let scale = summary.intensity * weight;
        (
            AffectPoint::new(point.activation * scale, point.valence * scale),
            weight,
        )
    }
}
