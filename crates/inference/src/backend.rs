use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use nooverfit_config::ClientConfig;

use crate::{InferenceError, InferenceGateway, InferenceResult, InlineAttachment};

pub(crate) const EMPTY_REPLY: &str = "No response received.";

/// Gateway to a NoOverfit server's `POST /api/chat` endpoint.
#[derive(Debug, Clone)]
pub struct BackendGateway {
    client: Client,
    base_url: String,
}

impl BackendGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> InferenceResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(InferenceError::Client)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> InferenceResult<Self> {
        Self::new(
            config.backend_url.clone(),
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    prompt: &'a str,
    model: &'a str,
    attachments: &'a [InlineAttachment],
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl InferenceGateway for BackendGateway {
    async fn query(
        &self,
        prompt: &str,
        model: &str,
        attachments: &[InlineAttachment],
    ) -> InferenceResult<String> {
        debug!(
            url = %self.base_url,
            model,
            attachments = attachments.len(),
            "posting chat request"
        );

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&ChatRequest {
                prompt,
                model,
                attachments,
            })
            .send()
            .await
            .map_err(InferenceError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorReply>()
                .await
                .ok()
                .and_then(|reply| reply.error)
                .filter(|message| !message.is_empty());
            return Err(InferenceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|error| InferenceError::InvalidResponse(error.to_string()))?;

        Ok(reply
            .text
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| EMPTY_REPLY.to_string()))
    }
}
