//! Error types shared across the workspace

use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for policy analysis operations
#[derive(Error, Debug)]
pub enum FpaError {
    /// Object reference graph is unusable (cycle, dangling name, or type
    /// mismatch). Fails the whole run; no partial results are produced.
    #[error("invalid object graph at '{object}': {reason}")]
    InvalidObjectGraph {
        /// Name of the object where resolution failed
        object: String,
        /// What made the graph invalid
        reason: String,
    },

    /// Textual predicate that could not be parsed into a typed form
    #[error("invalid predicate expression '{text}'")]
    InvalidPredicate {
        /// The offending input text
        text: String,
    },

    /// Traffic log line with a recognized event id but unusable fields
    #[error("malformed log entry: {line}")]
    MalformedLogEntry {
        /// The offending line
        line: String,
    },

    /// Conflict resolution produced a duplicate object name
    #[error("ambiguous resolution: object name '{name}' collides after rename")]
    AmbiguousResolution {
        /// The colliding final name
        name: String,
    },

    /// Migration strategy string not recognized
    #[error("unknown migration strategy '{0}'")]
    UnknownStrategy(String),

    /// Device id not present in the store
    #[error("device not found: {0}")]
    DeviceNotFound(Uuid),

    /// Analysis id not present in the run history
    #[error("analysis not found: {0}")]
    AnalysisNotFound(Uuid),

    /// Merge group id not present in the current candidate set
    #[error("merge group not found: {0}")]
    MergeGroupNotFound(String),
}

/// Result alias used throughout the workspace
pub type FpaResult<T> = Result<T, FpaError>;
