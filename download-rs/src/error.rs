//! Error types for download-rs

use thiserror::Error;

/// Result type alias for download operations
pub type Result<T> = std::result::Result<T, DownloadError>;

/// Download error types
#[derive(Error, Debug)]
pub enum DownloadError {
    /// The key-value backend could not complete a read, write or atomic add
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Stored value has the wrong shape for the requested operation
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<sqlx::Error> for DownloadError {
    fn from(e: sqlx::Error) -> Self {
        DownloadError::BackendUnavailable(e.to_string())
    }
}

impl DownloadError {
    /// Whether the error came from the backend (caller may retry)
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, DownloadError::BackendUnavailable(_))
    }
}
