use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use nooverfit_config::InferenceConfig;

use crate::{
    is_thinking_model, InferenceError, InferenceGateway, InferenceResult, InlineAttachment,
};

const API_KEY_HEADER: &str = "x-goog-api-key";
const CREDENTIAL_ENV_VARS: &[&str] = &["API_KEY", "GEMINI_API_KEY"];

/// Gateway to the upstream Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiGateway {
    client: Client,
    api_key: String,
    base_url: String,
    system_instruction: String,
    thinking_budget: u32,
}

impl std::fmt::Debug for GeminiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiGateway")
            .field("base_url", &self.base_url)
            .field("thinking_budget", &self.thinking_budget)
            .finish_non_exhaustive()
    }
}

impl GeminiGateway {
    /// Builds the gateway, falling back to the `API_KEY` and `GEMINI_API_KEY`
    /// environment variables when the configuration carries no key.
    pub fn from_config(config: &InferenceConfig) -> InferenceResult<Self> {
        let from_config = config
            .gemini
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty());
        let api_key_source = if from_config.is_some() { "config" } else { "env" };

        let api_key = from_config
            .or_else(|| {
                CREDENTIAL_ENV_VARS
                    .iter()
                    .filter_map(|name| std::env::var(name).ok())
                    .find(|value| !value.trim().is_empty())
            })
            .ok_or(InferenceError::MissingCredential)?;

        debug!(source = api_key_source, "initialising Gemini gateway");

        let client = Client::builder()
            .timeout(Duration::from_secs(config.gemini.request_timeout_seconds))
            .build()
            .map_err(InferenceError::Client)?;

        Ok(Self {
            client,
            api_key,
            base_url: config.gemini.base_url.trim_end_matches('/').to_string(),
            system_instruction: config.system_instruction.clone(),
            thinking_budget: config.thinking_budget,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    fn build_request(
        &self,
        prompt: &str,
        model: &str,
        attachments: &[InlineAttachment],
    ) -> GenerateContentRequest {
        let generation_config = is_thinking_model(model).then(|| GenerationConfig {
            thinking_config: ThinkingConfig {
                thinking_budget: self.thinking_budget,
            },
        });

        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(self.system_instruction.clone())],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: build_parts(prompt, attachments),
            }],
            generation_config,
        }
    }
}

/// One inline part per attachment, in order, followed by the prompt text.
fn build_parts(prompt: &str, attachments: &[InlineAttachment]) -> Vec<Part> {
    let mut parts: Vec<Part> = attachments
        .iter()
        .map(|attachment| Part {
            text: None,
            inline_data: Some(InlineData {
                mime_type: attachment.mime_type.clone(),
                data: attachment.payload().to_string(),
            }),
        })
        .collect();
    parts.push(Part::text(format!("User Query: {prompt}")));
    parts
}

#[async_trait]
impl InferenceGateway for GeminiGateway {
    async fn query(
        &self,
        prompt: &str,
        model: &str,
        attachments: &[InlineAttachment],
    ) -> InferenceResult<String> {
        let request = self.build_request(prompt, model, attachments);
        debug!(
            model,
            attachments = attachments.len(),
            thinking = request.generation_config.is_some(),
            "sending generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(InferenceError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(InferenceError::Transport)?;

        if !status.is_success() {
            let message = serde_json::from_str::<UpstreamErrorBody>(&body)
                .ok()
                .and_then(|parsed| parsed.error)
                .and_then(|error| error.message)
                .filter(|message| !message.is_empty());
            return Err(InferenceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|error| InferenceError::InvalidResponse(error.to_string()))?;

        let text = parsed.text();
        if text.is_empty() {
            warn!(model, "upstream returned no text candidates");
        }
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            inline_data: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    thinking_config: ThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, leaving out thought summaries.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|part| !part.thought)
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorBody {
    #[serde(default)]
    error: Option<UpstreamError>,
}

#[derive(Debug, Deserialize)]
struct UpstreamError {
    #[serde(default)]
    message: Option<String>,
}
