//! Error types for the measurement harness.
//!
//! Only configuration, launch and output-writing problems are errors. A run
//! whose output cannot be parsed is not an error: it yields fewer (possibly
//! zero) samples and still completes the pipeline.

use std::io;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The requested test type has no TCP or UDP extension option set.
    #[error("missing test options for netperf test `{test}`")]
    MissingTestOptions { test: String },

    /// A run request failed validation before any command was built.
    #[error("invalid run request: {0}")]
    InvalidRequest(String),

    /// The subprocess could not be started.
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
