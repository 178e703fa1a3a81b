//! Affect Core - multimodal affect fusion and psychological risk assessment
//!
//! Affect Core takes timestamped emotional signals from three independent
//! modalities, aligns them on a shared timeline, fuses them into one
//! activation/valence estimate per instant, derives a six-axis psychological
//! state from it and raises risk alerts over the life of an analysis session.
//!
//! # Architecture
//!
//! The pipeline runs in stages, each in its own module:
//!
//! 1. **Modality events** (`modality`, `analyzer`): analyzer output validated into typed events
//! 2. **Time alignment** (`timeline`): one bucket per distinct timestamp
//! 3. **Fusion** (`fusion`): confidence-weighted activation/valence per bucket
//! 4. **Assessment** (`assessment`): dimensions, risk rules and suggestions
//! 5. **Alerting** (`alert`): alerts from the latest assessment
//!
//! The [`SessionOrchestrator`] sequences these stages against injected
//! analyzers and a [`RecordStore`], and drives the session's status machine.
//!
//! # Quick Start
//!
//! ```
//! use affect_core::assessment::{Assessor, RiskType};
//! use affect_core::fusion::{FusedEmotionState, FusionEngine};
//! use affect_core::modality::{FacialExpression, FacialExpressionEvent};
//! use affect_core::timeline::align;
//! use chrono::Utc;
//! use uuid::Uuid;
//!
//! let fear = FacialExpressionEvent::new(Utc::now(), FacialExpression::Fear, 1.0, 1.0);
//! let timeline = align(&[fear], &[], &[]);
//!
//! let engine = FusionEngine::default();
//! let session = Uuid::new_v4();
//! let states: Vec<FusedEmotionState> = timeline
//!     .buckets()
//!     .iter()
//!     .map(|b| FusedEmotionState::new(session, b.timestamp, engine.fuse(b)))
//!     .collect();
//!
//! let assessments = Assessor::default().assess_all(&states, None);
//! assert!(assessments[0]
//!     .risks
//!     .iter()
//!     .any(|r| r.risk_type == RiskType::HighAnxiety));
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod alert;
pub mod analyzer;
pub mod assessment;
pub mod config;
pub mod error;
pub mod fusion;
pub mod modality;
pub mod orchestrator;
pub mod results;
pub mod session;
pub mod store;
pub mod timeline;
pub mod types;

// Re-export commonly used types for convenience
pub use alert::{AlertEmitter, AlertPolicy, AlertStatus, SystemAlert};
pub use analyzer::{Analyzers, FacialAnalyzer, SpeechAnalyzer, TextAnalyzer};
pub use assessment::{Assessor, DimensionVector, PsychologicalAssessment, RiskRecord, RiskType};
pub use config::PipelineConfig;
pub use error::{AffectError, Result, ResultExt};
pub use fusion::{FusedEmotionState, FusionEngine, FusionWeights};
pub use modality::{Modality, ModalityEvent};
pub use orchestrator::{SessionInput, SessionOrchestrator, SessionOutcome, SessionRequest};
pub use results::{alert_feed, ResultsView, SessionResults};
pub use session::{AnalysisSession, SessionId, SessionStatus};
pub use store::{MemoryStore, RecordStore, SqliteStore};
pub use types::{RiskLevel, Severity, Timestamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
