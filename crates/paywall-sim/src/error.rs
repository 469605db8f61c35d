//! Replay errors.

use std::path::PathBuf;

use paywall_app::PaywallError;
use thiserror::Error;

/// Failures that abort a replay.
#[derive(Debug, Error)]
pub enum SimError {
    /// A fixture or session file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// A fixture file is not valid JSON of the expected shape
    #[error("{path}:{line}: {source}")]
    Json {
        /// File path
        path: PathBuf,
        /// One-based line, for session files; 0 for whole-file documents
        line: usize,
        /// Underlying error
        source: serde_json::Error,
    },

    /// The paywall refused a host operation
    #[error(transparent)]
    Paywall(#[from] PaywallError),
}
