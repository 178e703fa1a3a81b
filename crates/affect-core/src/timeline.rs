//! Time alignment of modality events onto a shared timeline
//!
//! Buckets are exactly the union of observed timestamps: no resampling, no
//! interpolation. Facial events are keyed by their timestamp, speech segments
//! by their start, text snippets by their timestamp.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::modality::{
    FacialExpressionEvent, Modality, ModalityEvent, SpeechEmotionSegment, TextSentimentSnippet,
};
use crate::types::Timestamp;

/// The part of an event the fusion stage reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalitySummary {
    /// Expression type, emotion type, or polarity
    pub label: String,
    pub intensity: f64,
    pub confidence: f64,
}

impl From<&FacialExpressionEvent> for ModalitySummary {
    fn from(e: &FacialExpressionEvent) -> Self {
        Self {
            label: e.expression().to_string(),
            intensity: e.intensity(),
            confidence: e.confidence(),
        }
    }
}

impl From<&SpeechEmotionSegment> for ModalitySummary {
    fn from(e: &SpeechEmotionSegment) -> Self {
        Self {
            label: e.emotion().to_string(),
            intensity: e.intensity(),
            confidence: e.confidence(),
        }
    }
}

impl From<&TextSentimentSnippet> for ModalitySummary {
    fn from(e: &TextSentimentSnippet) -> Self {
        Self {
            label: e.polarity().to_string(),
            intensity: e.intensity(),
            confidence: e.confidence(),
        }
    }
}

/// One instant on the shared timeline with at most one summary per modality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineBucket {
    pub timestamp: Timestamp,
    pub facial: Option<ModalitySummary>,
    pub speech: Option<ModalitySummary>,
    pub text: Option<ModalitySummary>,
}

impl TimelineBucket {
    pub fn empty(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            facial: None,
            speech: None,
            text: None,
        }
    }

    pub fn get(&self, modality: Modality) -> Option<&ModalitySummary> {
        match modality {
            Modality::Facial => self.facial.as_ref(),
            Modality::Speech => self.speech.as_ref(),
            Modality::Text => self.text.as_ref(),
        }
    }

    fn slot_mut(&mut self, modality: Modality) -> &mut Option<ModalitySummary> {
        match modality {
            Modality::Facial => &mut self.facial,
            Modality::Speech => &mut self.speech,
            Modality::Text => &mut self.text,
        }
    }

    /// Number of modalities present in this bucket
    pub fn modalities_count(&self) -> usize {
        Modality::ALL
            .iter()
            .filter(|m| self.get(**m).is_some())
            .count()
    }
}

/// Ordered sequence of buckets, ascending by timestamp
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    buckets: Vec<TimelineBucket>,
}

impl Timeline {
    pub fn buckets(&self) -> &[TimelineBucket] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn into_buckets(self) -> Vec<TimelineBucket> {
        self.buckets
    }
}

/// Align the three modality streams into a timeline.
///
/// When one modality has several events on the same key, the last one in
/// input order occupies the slot.
pub fn align(
    facial: &[FacialExpressionEvent],
    speech: &[SpeechEmotionSegment],
    text: &[TextSentimentSnippet],
) -> Timeline {
    let mut map: BTreeMap<Timestamp, TimelineBucket> = BTreeMap::new();

    let mut place = |timestamp: Timestamp, modality: Modality, summary: ModalitySummary| {
        let bucket = map
            .entry(timestamp)
            .or_insert_with(|| TimelineBucket::empty(timestamp));
        *bucket.slot_mut(modality) = Some(summary);
    };

    for e in facial {
        place(e.timestamp(), Modality::Facial, e.into());
    }
    for e in speech {
        place(e.start(), Modality::Speech, e.into());
    }
    for e in text {
        place(e.timestamp(), Modality::Text, e.into());
    }

    Timeline {
        buckets: map.into_values().collect(),
    }
}

/// Align a mixed event stream, e.g. one read back from a store.
pub fn align_events<'a, I>(events: I) -> Timeline
where
    I: IntoIterator<Item = &'a ModalityEvent>,
{
    let (mut facial, mut speech, mut text) = (Vec::new(), Vec::new(), Vec::new());
    for event in events {
        match event {
            ModalityEvent::Facial(e) => facial.push(e.clone()),
            ModalityEvent::Speech(e) => speech.push(e.clone()),
            ModalityEvent::Text(e) => text.push(e.clone()),
        }
    }
    align(&facial, &speech, &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modality::{FacialExpression, Polarity, SpeechEmotion};
    use chrono::{Duration, TimeZone, Utc};

    fn at(secs: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_buckets_are_union_of_keys_in_order() {
        let facial = vec![
            FacialExpressionEvent::new(at(5), FacialExpression::Fear, 0.8, 0.9),
            FacialExpressionEvent::new(at(1), FacialExpression::Neutral, 0.1, 0.9),
        ];
        let speech = vec![SpeechEmotionSegment::new(
            at(1),
            at(11),
            SpeechEmotion::Calm,
            0.4,
            0.6,
        )];
        let text = vec![TextSentimentSnippet::new(at(3), "fine", Polarity::Positive, 0.3, 0.5)];

        let timeline = align(&facial, &speech, &text);
        let keys: Vec<_> = timeline.buckets().iter().map(|b| b.timestamp).collect();
        assert_eq!(keys, vec![at(1), at(3), at(5)]);

        let first = &timeline.buckets()[0];
        assert_eq!(first.modalities_count(), 2);
        assert_eq!(first.speech.as_ref().unwrap().label, "calm");
        assert!(first.text.is_none());
    }

    #[test]
    fn test_speech_uses_start_time_only() {
        let speech = vec![SpeechEmotionSegment::new(
            at(0),
            at(30),
            SpeechEmotion::Angry,
            0.9,
            0.9,
        )];
        let timeline = align(&[], &speech, &[]);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.buckets()[0].timestamp, at(0));
    }

    #[test]
    fn test_same_key_same_modality_last_wins() {
        let facial = vec![
            FacialExpressionEvent::new(at(2), FacialExpression::Anger, 0.5, 0.5),
            FacialExpressionEvent::new(at(2), FacialExpression::Happiness, 0.7, 0.8),
        ];
        let timeline = align(&facial, &[], &[]);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.buckets()[0].facial.as_ref().unwrap().label, "happiness");
    }

    #[test]
    fn test_empty_input_gives_empty_timeline() {
        assert!(align(&[], &[], &[]).is_empty());
    }

    #[test]
    fn test_align_events_matches_align() {
        let f = FacialExpressionEvent::new(at(4), FacialExpression::Sadness, 0.6, 0.7);
        let t = TextSentimentSnippet::new(at(2), "no", Polarity::Negative, 0.6, 0.7);
        let events = vec![ModalityEvent::from(f.clone()), ModalityEvent::from(t.clone())];
        assert_eq!(align_events(&events), align(&[f], &[], &[t]));
    }
}
