//! Error types for the looking-time recorder

use thiserror::Error;

/// Errors raised by the collaborators around the recording core.
///
/// The state machine itself never fails: illegal signals are ignored.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Name must not be empty")]
    EmptyName,

    #[error("A subject named \"{0}\" already exists")]
    DuplicateSubject(String),

    #[error("A trial named \"{0}\" already exists for this subject")]
    DuplicateTrial(String),

    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    #[error("Trial not found: {0}")]
    TrialNotFound(String),

    #[error("Invalid time limit: {0}")]
    InvalidTimeLimit(String),

    #[error("Invalid recording script: {0}")]
    Script(String),
}
