//! Psychological dimension calculator
//!
//! Fixed linear readouts of (activation, valence), each clamped to [0, 100].
//! High-arousal, negative-valence states push tension, anxiety and
//! defensiveness up and cooperation, calmness and credibility down.

use serde::{Deserialize, Serialize};

use crate::fusion::AffectPoint;
use crate::types::clamp_percent;

/// Six-axis psychological state, every axis in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionVector {
    pub tension: f64,
    pub anxiety: f64,
    pub cooperation: f64,
    pub calmness: f64,
    pub defensiveness: f64,
    pub credibility: f64,
}

/// One labelled axis for radar-chart presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarPoint {
    pub label: String,
    pub value: f64,
}

impl DimensionVector {
    pub fn from_affect(point: AffectPoint) -> Self {
        let a = finite_or_zero(point.activation);
        let v = finite_or_zero(point.valence);

        Self {
            tension: clamp_percent(a * 60.0 + v.abs() * 40.0),
            anxiety: clamp_percent(a * 70.0 - v * 30.0),
            cooperation: clamp_percent(50.0 + v * 50.0 - a * 20.0),
            calmness: clamp_percent(80.0 - a * 80.0),
            defensiveness: clamp_percent(a * 50.0 - v * 30.0),
            credibility: clamp_percent(70.0 + v * 20.0 - (a - 0.5).abs() * 40.0),
        }
    }

    /// Radar mapping: the same values relabelled, in a fixed axis order.
    pub fn radar(&self) -> Vec<RadarPoint> {
        [
            ("Tension", self.tension),
            ("Anxiety", self.anxiety),
            ("Cooperation", self.cooperation),
            ("Calmness", self.calmness),
            ("Defensiveness", self.defensiveness),
            ("Credibility", self.credibility),
        ]
        .into_iter()
        .map(|(label, value)| RadarPoint {
            label: label.to_string(),
            value,
        })
        .collect()
    }

    /// Overall emotional intensity in [0, 100]. Cooperation and calmness pull it down.
    pub fn overall_intensity(&self) -> f64 {
        clamp_percent(
            self.tension * 0.3 + self.anxiety * 0.25 + self.defensiveness * 0.2
                - self.cooperation * 0.15
                - self.calmness * 0.1,
        )
    }

    pub fn values(&self) -> [f64; 6] {
        [
            self.tension,
            self.anxiety,
            self.cooperation,
            self.calmness,
            self.defensiveness,
            self.credibility,
        ]
    }
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_fear_example() {
        let dims = DimensionVector::from_affect(AffectPoint::new(0.72, -0.64));
        assert!(close(dims.anxiety, 69.6));
        assert!(close(dims.tension, 0.72 * 60.0 + 0.64 * 40.0));
        assert!(close(dims.cooperation, 50.0 - 32.0 - 14.4));
        assert!(close(dims.calmness, 80.0 - 57.6));
        assert!(close(dims.defensiveness, 36.0 + 19.2));
        assert!(close(dims.credibility, 70.0 - 12.8 - 0.22 * 40.0));
    }

    #[test]
    fn test_neutral_affect() {
        let dims = DimensionVector::from_affect(AffectPoint::NEUTRAL);
        assert_eq!(dims.tension, 0.0);
        assert_eq!(dims.anxiety, 0.0);
        assert_eq!(dims.cooperation, 50.0);
        assert_eq!(dims.calmness, 80.0);
        assert_eq!(dims.defensiveness, 0.0);
        assert_eq!(dims.credibility, 50.0);
    }

    #[test]
    fn test_extreme_inputs_are_clamped() {
        let dims = DimensionVector::from_affect(AffectPoint::new(5.0, -5.0));
        assert_eq!(dims.tension, 100.0);
        assert_eq!(dims.anxiety, 100.0);
        assert_eq!(dims.cooperation, 0.0);
        assert_eq!(dims.calmness, 0.0);
        assert_eq!(dims.defensiveness, 100.0);
        assert_eq!(dims.credibility, 0.0);
    }

    #[test]
    fn test_radar_preserves_values() {
        let dims = DimensionVector::from_affect(AffectPoint::new(0.4, 0.2));
        let radar = dims.radar();
        assert_eq!(radar.len(), 6);
        assert_eq!(radar[0].label, "Tension");
        let values: Vec<f64> = radar.iter().map(|p| p.value).collect();
        assert_eq!(values, dims.values().to_vec());
    }

    #[test]
    fn test_overall_intensity_neutral_is_zero() {
        // 50 cooperation and 80 calmness outweigh zero arousal
        let dims = DimensionVector::from_affect(AffectPoint::NEUTRAL);
        assert_eq!(dims.overall_intensity(), 0.0);
    }

    #[test]
    fn test_overall_intensity_agitated() {
        let dims = DimensionVector::from_affect(AffectPoint::new(0.9, -0.8));
        let expected = dims.tension * 0.3 + dims.anxiety * 0.25 + dims.defensiveness * 0.2
            - dims.cooperation * 0.15
            - dims.calmness * 0.1;
        assert!(close(dims.overall_intensity(), expected));
        assert!(dims.overall_intensity() > 40.0);
    }

    proptest! {
        #[test]
        fn prop_dimensions_always_bounded(a in -1.0e6f64..1.0e6, v in -1.0e6f64..1.0e6) {
            let dims = DimensionVector::from_affect(AffectPoint::new(a, v));
            for value in dims.values() {
                prop_assert!((0.0..=100.0).contains(&value));
            }
            prop_assert!((0.0..=100.0).contains(&dims.overall_intensity()));
        }

        #[test]
        fn prop_non_finite_inputs_bounded(a in prop::num::f64::ANY, v in prop::num::f64::ANY) {
            let dims = DimensionVector::from_affect(AffectPoint::new(a, v));
            for value in dims.values() {
                prop_assert!((0.0..=100.0).contains(&value));
            }
        }
    }
}
