//! Error types for SEOScribe.
//!
//! Library crates use [`SeoScribeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all SEOScribe operations.
#[derive(Debug, thiserror::Error)]
pub enum SeoScribeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure talking to the chat API (connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// The chat API answered with a non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The chat API answered, but without usable text.
    #[error("generation error: {0}")]
    Generation(String),

    /// Spreadsheet reading or writing error.
    #[error("sheet error: {message}")]
    Sheet { message: String },

    /// Word-processor document assembly error.
    #[error("document error: {0}")]
    Document(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (empty input, bad option value, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SeoScribeError>;

impl SeoScribeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a sheet error from any displayable message.
    pub fn sheet(msg: impl Into<String>) -> Self {
        Self::Sheet {
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

    /// Whether resubmitting the same request could succeed.
    ///
    /// Rate limits, server errors, timeouts, dropped connections and empty
    /// completions are transient. Authentication and request errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Generation(_) => true,
            Self::Api { status, .. } => matches!(*status, 408 | 409 | 429) || *status >= 500,
            _ => false,
        }
    }
}
