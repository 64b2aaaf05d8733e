//! Result and error types for the harness.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur while driving a test command
///
/// None of these abort a harness run: the run loop converts them into
/// diagnostics at the iteration boundary.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The test command could not be started or failed while running
    #[error("Failed to run `{program}`: {source}")]
    Spawn {
        /// Program that was launched
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The test command exceeded its per-iteration timeout
    #[error("`{program}` timed out after {ms}ms")]
    Timeout {
        /// Program that was launched
        program: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Captured output was not a structured report
    #[error("Report decoding failed: {message}")]
    Decode {
        /// Decoder message
        message: String,
        /// Raw captured text, kept for diagnosis
        raw: String,
    },

    /// A report line could not be written
    #[error("Failed to write report {}: {source}", path.display())]
    Persist {
        /// Report file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Plain I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Harness configuration is unusable
    #[error("Invalid harness configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },
}

impl HarnessError {
    /// Create a spawn error
    #[must_use]
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(program: impl Into<String>, ms: u64) -> Self {
        Self::Timeout {
            program: program.into(),
            ms,
        }
    }

    /// Create a decode error carrying the raw text
    #[must_use]
    pub fn decode(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
            raw: raw.into(),
        }
    }

    /// Create a persistence error
    #[must_use]
    pub fn persist(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persist {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
