//! Replay analyzers
//!
//! A replay file is a session request whose units carry the detection an
//! analyzer already produced for them. The replay analyzers answer each
//! unit with its recorded detection, so a session can be re-run offline.
//!
//! ```json
//! {
//!   "case_ref": "case-117",
//!   "frames": [
//!     { "timestamp": "2024-05-14T14:30:00Z", "frame_index": 0,
//!       "detection": { "success": true, "payload": { "events": [
//!         { "type": "fear", "intensity": 0.8, "confidence": 0.9 } ] } } }
//!   ],
//!   "audio": [],
//!   "text": []
//! }
//! ```

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use affect_core::analyzer::{
    AnalyzerResponse, AudioSegment, FacialAnalyzer, FacialDetection, SpeechAnalyzer,
    SpeechDetection, TextAnalyzer, TextDetection, TextUnit, VideoFrame,
};
use affect_core::{Analyzers, SessionInput, SessionRequest, Timestamp};

/// A unit together with the detection recorded for it
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "U: Deserialize<'de>, P: Deserialize<'de>"))]
struct Recorded<U, P> {
    #[serde(flatten)]
    unit: U,
    #[serde(default)]
    detection: Option<AnalyzerResponse<P>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReplayFile {
    case_ref: Option<String>,
    subject_ref: Option<String>,
    frames: Vec<Recorded<VideoFrame, FacialDetection>>,
    audio: Vec<Recorded<AudioSegment, SpeechDetection>>,
    text: Vec<Recorded<TextUnit, TextDetection>>,
}

impl ReplayFile {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Reading replay file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Parsing replay file {}", path.display()))
    }

    /// Split into the session request and the analyzers that answer it.
    pub fn into_parts(self) -> (SessionRequest, Analyzers) {
        let mut input = SessionInput::default();

        let mut facial = FacialReplay::default();
        for r in self.frames {
            if let Some(d) = r.detection {
                facial.recorded.insert(frame_key(&r.unit), d);
            }
            input.frames.push(r.unit);
        }

        let mut speech = SpeechReplay::default();
        for r in self.audio {
            if let Some(d) = r.detection {
                speech.recorded.insert((r.unit.start, r.unit.end), d);
            }
            input.audio.push(r.unit);
        }

        let mut text = TextReplay::default();
        for r in self.text {
            if let Some(d) = r.detection {
                text.recorded.insert(text_key(&r.unit), d);
            }
            input.text.push(r.unit);
        }

        let request = SessionRequest {
            case_ref: self.case_ref,
            subject_ref: self.subject_ref,
            input,
        };
        let analyzers = Analyzers::new(Arc::new(facial), Arc::new(speech), Arc::new(text));
        (request, analyzers)
    }
}

fn frame_key(frame: &VideoFrame) -> (Timestamp, Option<u64>) {
    (frame.timestamp, frame.frame_index)
}

fn text_key(unit: &TextUnit) -> (Timestamp, String) {
    (unit.timestamp, unit.content.clone())
}

#[derive(Debug, Default)]
struct FacialReplay {
    recorded: HashMap<(Timestamp, Option<u64>), AnalyzerResponse<FacialDetection>>,
}

#[async_trait]
impl FacialAnalyzer for FacialReplay {
    async fn analyze_frame(
        &self,
        frame: &VideoFrame,
    ) -> affect_core::Result<AnalyzerResponse<FacialDetection>> {
        Ok(self
            .recorded
            .get(&frame_key(frame))
            .cloned()
            .unwrap_or_else(|| {
                AnalyzerResponse::failed(format!("no recorded detection for frame at {}", frame.timestamp))
            }))
    }
}

#[derive(Debug, Default)]
struct SpeechReplay {
    recorded: HashMap<(Timestamp, Timestamp), AnalyzerResponse<SpeechDetection>>,
}

#[async_trait]
impl SpeechAnalyzer for SpeechReplay {
    async fn analyze_segment(
        &self,
        segment: &AudioSegment,
    ) -> affect_core::Result<AnalyzerResponse<SpeechDetection>> {
        Ok(self
            .recorded
            .get(&(segment.start, segment.end))
            .cloned()
            .unwrap_or_else(|| {
                AnalyzerResponse::failed(format!("no recorded detection for segment at {}", segment.start))
            }))
    }
}

#[derive(Debug, Default)]
struct TextReplay {
    recorded: HashMap<(Timestamp, String), AnalyzerResponse<TextDetection>>,
}

#[async_trait]
impl TextAnalyzer for TextReplay {
    async fn analyze_snippet(
        &self,
        unit: &TextUnit,
    ) -> affect_core::Result<AnalyzerResponse<TextDetection>> {
        Ok(self
            .recorded
            .get(&text_key(unit))
            .cloned()
            .unwrap_or_else(|| {
                AnalyzerResponse::failed(format!("no recorded detection for text at {}", unit.timestamp))
            }))
    }
}
