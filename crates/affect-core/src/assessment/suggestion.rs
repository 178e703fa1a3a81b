//! Intervention suggestions
//!
//! A pure function of the dimension vector and the risk list. Output is a set:
//! duplicates collapse and the order of the input risks does not matter.

use std::collections::BTreeSet;

use super::dimensions::DimensionVector;
use super::risk::{RiskRecord, RiskType};

const ANXIETY_ABOVE: f64 = 70.0;
const COOPERATION_BELOW: f64 = 40.0;
const TENSION_ABOVE: f64 = 80.0;

const ANXIETY_SUGGESTIONS: [&str; 2] = [
    "Keep a gentle tone and avoid applying pressure",
    "Offer a short break",
];
const COOPERATION_SUGGESTIONS: [&str; 2] = [
    "Work on building rapport and trust",
    "Avoid confrontational questioning",
];
const TENSION_SUGGESTIONS: [&str; 2] = [
    "Help the subject release tension",
    "Consider pausing sensitive topics",
];

fn for_risk(risk_type: RiskType) -> &'static str {
    match risk_type {
        RiskType::HighAnxiety => "Bring in a psychological specialist",
        RiskType::LowCooperation => "Reframe questions around shared goals",
        RiskType::HighDefensiveness => {
            "Revisit the questioning strategy to reduce defensive triggers"
        }
        RiskType::SharpEmotionalSwing => {
            "Monitor emotional state closely and prepare contingency measures"
        }
    }
}

/// Suggestions for one assessment
pub fn suggest(dims: &DimensionVector, risks: &[RiskRecord]) -> BTreeSet<String> {
    let mut out = BTreeSet::new();

    if dims.anxiety > ANXIETY_ABOVE {
        out.extend(ANXIETY_SUGGESTIONS.iter().map(|s| s.to_string()));
    }
    if dims.cooperation < COOPERATION_BELOW {
        out.extend(COOPERATION_SUGGESTIONS.iter().map(|s| s.to_string()));
    }
    if dims.tension > TENSION_ABOVE {
        out.extend(TENSION_SUGGESTIONS.iter().map(|s| s.to_string()));
    }

    out.extend(risks.iter().map(|r| for_risk(r.risk_type).to_string()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use chrono::Utc;
    use proptest::prelude::*;

    fn calm() -> DimensionVector {
        DimensionVector {
            tension: 10.0,
            anxiety: 10.0,
            cooperation: 70.0,
            calmness: 70.0,
            defensiveness: 10.0,
            credibility: 60.0,
        }
    }

    fn risk(risk_type: RiskType) -> RiskRecord {
        RiskRecord {
            risk_type,
            severity: Severity::High,
            evidence: String::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_calm_state_no_suggestions() {
        assert!(suggest(&calm(), &[]).is_empty());
    }

    #[test]
    fn test_threshold_suggestions_come_in_pairs() {
        let mut dims = calm();
        dims.anxiety = 75.0;
        assert_eq!(suggest(&dims, &[]).len(), 2);

        dims.cooperation = 35.0;
        assert_eq!(suggest(&dims, &[]).len(), 4);

        dims.tension = 85.0;
        assert_eq!(suggest(&dims, &[]).len(), 6);
    }

    #[test]
    fn test_repeated_risks_are_deduplicated() {
        let risks = vec![
            risk(RiskType::SharpEmotionalSwing),
            risk(RiskType::SharpEmotionalSwing),
        ];
        let out = suggest(&calm(), &risks);
        assert_eq!(out.len(), 1);
        assert!(out.contains("Monitor emotional state closely and prepare contingency measures"));
    }

    #[test]
    fn test_every_risk_type_has_a_suggestion() {
        let risks = vec![
            risk(RiskType::HighAnxiety),
            risk(RiskType::LowCooperation),
            risk(RiskType::HighDefensiveness),
            risk(RiskType::SharpEmotionalSwing),
        ];
        assert_eq!(suggest(&calm(), &risks).len(), 4);
    }

    fn risk_type_strategy() -> impl Strategy<Value = RiskType> {
        prop_oneof![
            Just(RiskType::HighAnxiety),
            Just(RiskType::LowCooperation),
            Just(RiskType::HighDefensiveness),
            Just(RiskType::SharpEmotionalSwing),
        ]
    }

    proptest! {
        #[test]
        fn prop_suggestions_ignore_risk_order(
            kinds in prop::collection::vec(risk_type_strategy(), 0..6),
            anxiety in 0.0f64..100.0,
            cooperation in 0.0f64..100.0,
            tension in 0.0f64..100.0,
        ) {
            let dims = DimensionVector { anxiety, cooperation, tension, ..calm() };
            let risks: Vec<RiskRecord> = kinds.into_iter().map(risk).collect();
            let mut reversed = risks.clone();
            reversed.reverse();
            let mut rotated = risks.clone();
            if !rotated.is_empty() {
                rotated.rotate_left(1);
            }
            let expected = suggest(&dims, &risks);
            prop_assert_eq!(&suggest(&dims, &reversed), &expected);
            prop_assert_eq!(&suggest(&dims, &rotated), &expected);
        }
    }
}
