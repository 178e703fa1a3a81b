//! Psychological assessment of fused states
//!
//! An assessment is created for every fused state, in timestamp order. The
//! sharp-swing rule reads the assessment immediately before it, so callers
//! must never feed states in arrival order: [`Assessor::assess_all`] sorts first.

pub mod dimensions;
pub mod risk;
pub mod suggestion;

pub use dimensions::{DimensionVector, RadarPoint};
pub use risk::{RiskEngine, RiskRecord, RiskThresholds, RiskType};
pub use suggestion::suggest;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fusion::{AffectPoint, FusedEmotionState};
use crate::types::{RiskLevel, Timestamp};

/// Assessment derived from one fused state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsychologicalAssessment {
    pub session_id: Uuid,
    pub timestamp: Timestamp,
    /// Fused affect the dimensions were read from
    pub affect: AffectPoint,
    pub dimensions: DimensionVector,
    pub radar: Vec<RadarPoint>,
    pub overall_intensity: f64,
    pub risks: Vec<RiskRecord>,
    pub suggestions: Vec<String>,
    pub risk_level: RiskLevel,
}

/// Runs dimensions, risk rules and suggestions for fused states
#[derive(Debug, Clone, Default)]
pub struct Assessor {
    risk_engine: RiskEngine,
}

impl Assessor {
    pub fn new(risk_engine: RiskEngine) -> Self {
        Self { risk_engine }
    }

    /// Assess one fused state given the immediately preceding assessment.
    pub fn assess(
        &self,
        state: &FusedEmotionState,
        previous: Option<&PsychologicalAssessment>,
    ) -> PsychologicalAssessment {
        let dimensions = DimensionVector::from_affect(state.affect());
        let risks = self.risk_engine.evaluate(
            &dimensions,
            previous.map(|p| &p.dimensions),
            state.timestamp,
        );
        let suggestions = suggest(&dimensions, &risks).into_iter().collect();
        let risk_level = RiskLevel::aggregate(&risks);

        PsychologicalAssessment {
            session_id: state.session_id,
            timestamp: state.timestamp,
            affect: state.affect(),
            radar: dimensions.radar(),
            overall_intensity: dimensions.overall_intensity(),
            dimensions,
            risks,
            suggestions,
            risk_level,
        }
    }

    /// Assess a batch of fused states in timestamp order.
    ///
    /// `seed` is the last assessment already recorded for the session, if any;
    /// it only serves as the previous reading for the first state.
    pub fn assess_all(
        &self,
        states: &[FusedEmotionState],
        seed: Option<&PsychologicalAssessment>,
    ) -> Vec<PsychologicalAssessment> {
        let mut ordered: Vec<&FusedEmotionState> = states.iter().collect();
        ordered.sort_by_key(|s| s.timestamp);

        let mut out: Vec<PsychologicalAssessment> = Vec::with_capacity(ordered.len());
        for state in ordered {
            let previous = out.last().or(seed);
            let assessment = self.assess(state, previous);
            out.push(assessment);
        }
        out
    }
}
