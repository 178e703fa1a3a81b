//! Error types for Affect Core
//!
//! This module defines the error types used throughout the pipeline.
//! Per-item analyzer failures never surface here: they are folded into
//! [`ItemOutcome::Skipped`](crate::orchestrator::ItemOutcome). `AffectError` is the
//! session-level channel for faults that end a session.

use thiserror::Error;
use uuid::Uuid;

use crate::modality::Modality;

/// Result type alias for Affect operations
pub type Result<T> = std::result::Result<T, AffectError>;

/// Main error type for Affect operations
#[derive(Error, Debug)]
pub enum AffectError {
    /// Session lookup failed
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    /// Alert lookup failed
    #[error("Alert not found: {0}")]
    AlertNotFound(Uuid),

    /// Session status change not permitted by the state machine
    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Alert status change not permitted
    #[error("Invalid alert transition from {from} to {to}")]
    InvalidAlertTransition { from: String, to: String },

    /// Malformed input at a boundary
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An external analyzer failed
    #[error("{modality} analyzer error: {message}")]
    Analyzer { modality: Modality, message: String },

    /// Record store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        source: Box<AffectError>,
    },
}

impl AffectError {
    /// Add context to an error
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Build an analyzer error for a modality
    pub fn analyzer(modality: Modality, message: impl Into<String>) -> Self {
        Self::Analyzer {
            modality,
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for AffectError {
    fn from(e: rusqlite::Error) -> Self {
        AffectError::Store(e.to_string())
    }
}

impl From<toml::de::Error> for AffectError {
    fn from(e: toml::de::Error) -> Self {
        AffectError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for AffectError {
    fn from(e: toml::ser::Error) -> Self {
        AffectError::Config(e.to_string())
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add lazy context to a Result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.context(f()))
    }
}
