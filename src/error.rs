//! Error taxonomy for the size-report workflow.

use std::path::PathBuf;

/// Errors surfaced by the size-report workflow.
///
/// Each variant maps to one operator-visible failure class. Fatal errors
/// abort before any file is rewritten, so a failed invocation leaves the
/// report tree untouched.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input folder is missing, not a directory, or contains no artifacts.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A persisted report does not match any recognized schema or contains
    /// a structurally invalid row.
    #[error("corrupt report {path}: {reason}")]
    CorruptReport {
        /// Report file that failed to parse.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// A required version-control lookup failed.
    #[error("commit metadata unavailable: {0}")]
    MetadataUnavailable(String),

    /// The requested output location falls outside the reports root.
    #[error("output path invalid: {0}")]
    OutputPathInvalid(String),

    /// Underlying filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest or index JSON could not be produced.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
