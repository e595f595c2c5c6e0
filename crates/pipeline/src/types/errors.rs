//! Error types for the upload and conversation pipeline.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Main error type for the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{message}")]
    Validation { message: String },

    #[error("Ingestion failed: {message}")]
    Ingestion { message: String },

    #[error("Maximum {capacity} documents allowed.")]
    CapacityExceeded { capacity: usize },

    #[error("Page count unavailable: {message}")]
    Probe { message: String },

    #[error("Session storage error: {message}")]
    Storage { message: String },

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an ingestion error
    pub fn ingestion(message: impl Into<String>) -> Self {
        Self::Ingestion {
            message: message.into(),
        }
    }

    /// Create a page-count probe error
    pub fn probe(message: impl Into<String>) -> Self {
        Self::Probe {
            message: message.into(),
        }
    }

    /// Create a session storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Ingestion {
            message: format!("worker task failed: {}", err),
        }
    }
}
