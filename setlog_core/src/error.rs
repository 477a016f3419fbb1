//! Error types for the setlog_core library.

use crate::ExecutionStatus;
use std::io;
use uuid::Uuid;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for setlog_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Attempted to start a session from a template with no exercises
    #[error("Template '{0}' has no exercises")]
    EmptyTemplate(String),

    /// An exercise or set index that does not exist in the session
    #[error("Index out of range: exercise {exercise}, set {set:?}")]
    IndexOutOfRange { exercise: usize, set: Option<usize> },

    /// Operation on a session that is no longer in progress
    #[error("Session is closed (status: {0:?})")]
    SessionClosed(ExecutionStatus),

    /// Finalize called on a session that was already completed
    #[error("Session has already been finalized")]
    AlreadyFinalized,

    /// Finalize called with zero completed sets
    #[error("No completed sets to record")]
    NoProgress,

    /// Template lookup failed
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// Template failed structural validation
    #[error("Template validation error: {0}")]
    TemplateValidation(String),

    /// Completed execution lookup failed
    #[error("Execution not found: {0}")]
    ExecutionNotFound(Uuid),

    /// Goal definition cannot be evaluated
    #[error("Invalid goal: {0}")]
    InvalidGoal(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistence store rejected an operation
    #[error("Store error: {0}")]
    Store(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
