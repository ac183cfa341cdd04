//! Error types for the mock server
//!
//! Provides unified error handling using thiserror. Most of these errors never
//! reach a client: the loader and resolver degrade them into empty bodies or
//! pass-through transforms, and only path/method problems surface as responses.

use std::path::PathBuf;

use axum::http::StatusCode;
use thiserror::Error;

// == Mock Error Enum ==
/// Unified error type for the mock server.
#[derive(Error, Debug)]
pub enum MockError {
    /// Request path contains characters that cannot map to a file
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// HTTP method with no data directory convention
    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    /// Configuration rejected at startup
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// File could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Data or routes file is not valid JSON5
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Logic file failed to compile or run
    #[error("Script error in {path}: {message}")]
    Script { path: PathBuf, message: String },

    /// Filesystem watcher could not be set up
    #[error("Watch error: {0}")]
    Watch(String),
}

impl MockError {
    /// Status code of the artifact built from this error by
    /// `MockArtifact::from_error`.
    pub fn status_code(&self) -> StatusCode {
        match self {
            MockError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            MockError::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<notify::Error> for MockError {
    fn from(err: notify::Error) -> Self {
        MockError::Watch(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the mock server.
pub type Result<T> = std::result::Result<T, MockError>;
