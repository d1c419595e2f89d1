//! Error types for the CAD knowledge-base builder.
//!
//! Library crates use [`CadKbError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all knowledge-base operations.
#[derive(Debug, thiserror::Error)]
pub enum CadKbError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during the documentation crawl.
    #[error("network error: {0}")]
    Network(String),

    /// Markup or instruction-text parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Knowledge store error. Always fatal for the run.
    #[error("storage error: {0}")]
    Storage(String),

    /// PDF text-layer extraction error.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (bad URL, conflicting flags, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CadKbError>;

impl CadKbError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error ends the run (store and filesystem failures).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io { .. })
    }
}
