//! Error taxonomy
//!
//! `CrystallizationError` describes why the workflow rejected an operation.
//! It is stored on failed operation records, so it round-trips through the
//! registry file. `ExternalClientError` wraps failures of the reporting
//! backend and of the filesystem.

use crate::models::{CrystallizationStatus, ReviewDecision};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A crystallize precondition that was not satisfied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "condition", rename_all = "kebab-case")]
pub enum UnmetCondition {
    #[error("test must be approved before crystallization (current status: {status})")]
    NotApproved { status: CrystallizationStatus },

    #[error("test must be validated before crystallization")]
    MissingValidation,

    #[error("attached validation result is not valid")]
    ValidationFailed,

    #[error("quality score {score} below threshold {minimum}")]
    QualityBelowThreshold { score: f64, minimum: f64 },

    #[error("{have} reviewer(s) recorded, {required} required")]
    InsufficientReviewers { have: usize, required: usize },

    #[error("most recent review decision is {}", decision_name(.decision))]
    LatestDecisionNotApprove { decision: Option<ReviewDecision> },

    #[error("only crystallized tests can be locked (current status: {status})")]
    NotCrystallized { status: CrystallizationStatus },

    #[error("test content changed since it was reviewed; refresh it and review it again")]
    ContentChanged,
}

fn decision_name(decision: &Option<ReviewDecision>) -> &'static str {
    decision.as_ref().map_or("missing", ReviewDecision::name)
}

/// Workflow rejection reasons
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CrystallizationError {
    #[error("test not registered: {path}")]
    NotFound { path: String },

    #[error("test already registered with unchanged content: {path}")]
    DuplicateRegistration { path: String },

    #[error("precondition failed: {condition}")]
    Precondition { condition: UnmetCondition },

    #[error("illegal transition: {from} -> {to}")]
    IllegalTransition {
        from: CrystallizationStatus,
        to: CrystallizationStatus,
    },

    #[error("test is locked, unlock it before changing its content: {path}")]
    Locked { path: String },

    #[error("test is deprecated: {path}")]
    Deprecated { path: String },

    #[error("validation result for {validated} cannot be attached to {path}")]
    ValidationPathMismatch { path: String, validated: String },
}

impl From<UnmetCondition> for CrystallizationError {
    fn from(condition: UnmetCondition) -> Self {
        CrystallizationError::Precondition { condition }
    }
}

/// Failures of the reporting backend or the filesystem
#[derive(Debug, thiserror::Error)]
pub enum ExternalClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("request failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ExternalClientError>,
    },

    #[error("failed to connect to reporting backend: {0}")]
    Unreachable(String),

    #[error("reporting client error: {0}")]
    Client(String),

    #[error("failed to access '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in '{}': {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ExternalClientError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExternalClientError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        ExternalClientError::Json {
            path: path.into(),
            source,
        }
    }

    /// Whether the backend answered "not found"
    pub fn is_not_found(&self) -> bool {
        match self {
            ExternalClientError::Api { status, message } => {
                *status == 404 || message.to_lowercase().contains("not found")
            }
            ExternalClientError::RetriesExhausted { last, .. } => last.is_not_found(),
            _ => false,
        }
    }
}
