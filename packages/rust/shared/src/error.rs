//! Error types for SchemaConsole.
//!
//! Library crates use [`ConsoleError`] via `thiserror`.
//! App crates (cli/tui) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all SchemaConsole operations.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure talking to the backend (connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("backend error: {endpoint} returned HTTP {status}: {detail}")]
    Api {
        status: u16,
        endpoint: String,
        detail: String,
    },

    /// A response body did not match the expected shape.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Session database error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Form or state validation error (missing field, illegal page transition, ...).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The console session is missing a prerequisite (not connected, KG not loaded).
    #[error("session error: {0}")]
    Session(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ConsoleError>;

impl ConsoleError {
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

    /// HTTP status of a backend error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ConsoleError::config("missing backend URL");
        assert_eq!(err.to_string(), "config error: missing backend URL");

        let err = ConsoleError::validation("database is required");
        assert!(err.to_string().contains("database is required"));
    }

    #[test]
    fn api_error_carries_status() {
        let err = ConsoleError::Api {
            status: 404,
            endpoint: "/metadata/download".into(),
            detail: "File not found".into(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(
            err.to_string(),
            "backend error: /metadata/download returned HTTP 404: File not found"
        );
        assert_eq!(ConsoleError::Network("refused".into()).status(), None);
    }
}
