//! Remote model inference for NoOverfit.
//!
//! A turn is one prompt plus zero or more inline attachments, sent in a single
//! request with no retries and no streaming. Two transports implement
//! [`InferenceGateway`]:
//!
//! - [`GeminiGateway`] talks to the upstream `generateContent` API and is used
//!   by the HTTP service.
//! - [`BackendGateway`] talks to the service's own `POST /api/chat` endpoint and
//!   is used by client front-ends.

mod backend;
mod gemini;

pub use backend::BackendGateway;
pub use gemini::GeminiGateway;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message surfaced when the server has no upstream credential.
pub const MISSING_CREDENTIAL_MESSAGE: &str = "API_KEY environment variable is missing on server.";

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("{}", MISSING_CREDENTIAL_MESSAGE)]
    MissingCredential,
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("network request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("request failed with status {status}")]
    Status { status: u16, message: Option<String> },
    #[error("{0}")]
    Upstream(String),
    #[error("invalid inference response: {0}")]
    InvalidResponse(String),
}

/// Coarse classification of an [`InferenceError`], used to pick the message
/// shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceErrorKind {
    /// The endpoint could not be reached or failed without explanation.
    Connectivity,
    /// The endpoint answered with an explanation of why it refused.
    Rejected,
    /// The server is missing required configuration.
    Configuration,
    /// The endpoint answered with something unparseable.
    Malformed,
}

impl InferenceError {
    pub fn kind(&self) -> InferenceErrorKind {
        match self {
            InferenceError::MissingCredential => InferenceErrorKind::Configuration,
            InferenceError::Client(_) => InferenceErrorKind::Configuration,
            InferenceError::Transport(_) => InferenceErrorKind::Connectivity,
            InferenceError::Status {
                status,
                message: None,
            } if *status >= 500 => InferenceErrorKind::Connectivity,
            InferenceError::Status { .. } | InferenceError::Upstream(_) => {
                InferenceErrorKind::Rejected
            }
            InferenceError::InvalidResponse(_) => InferenceErrorKind::Malformed,
        }
    }

    /// Human readable detail, preferring whatever the remote side said.
    pub fn detail(&self) -> String {
        match self {
            InferenceError::Status {
                message: Some(message),
                ..
            } => message.clone(),
            InferenceError::Status {
                status,
                message: None,
            } => format!("Request failed with status {status}"),
            other => other.to_string(),
        }
    }
}

pub type InferenceResult<T> = Result<T, InferenceError>;

/// One attachment in wire form: a MIME type and base64 data, optionally still
/// carrying its `data:<mime>;base64,` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineAttachment {
    pub mime_type: String,
    pub base64: String,
}

impl InlineAttachment {
    pub fn new(mime_type: impl Into<String>, base64: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            base64: base64.into(),
        }
    }

    /// The base64 payload with any data-URI prefix removed.
    pub fn payload(&self) -> &str {
        strip_data_uri(&self.base64)
    }
}

/// Returns the portion after the first comma, or the whole input when there is none.
pub fn strip_data_uri(encoded: &str) -> &str {
    match encoded.split_once(',') {
        Some((_, payload)) => payload,
        None => encoded,
    }
}

/// Models following the `thinking` naming convention receive a reasoning budget.
pub fn is_thinking_model(model: &str) -> bool {
    model.contains("thinking")
}

#[async_trait]
pub trait InferenceGateway: Send + Sync {
    async fn query(
        &self,
        prompt: &str,
        model: &str,
        attachments: &[InlineAttachment],
    ) -> InferenceResult<String>;
}
