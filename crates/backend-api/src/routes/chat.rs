use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use nooverfit_inference::InlineAttachment;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub attachments: Vec<InlineAttachment>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub text: String,
}

pub async fn chat_completion(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    let prompt = request
        .prompt
        .filter(|prompt| !prompt.is_empty())
        .ok_or_else(|| ApiError::bad_request("Prompt is required"))?;

    let gateway = state.gateway()?;

    let model = request
        .model
        .filter(|model| !model.trim().is_empty())
        .unwrap_or_else(|| state.config().inference.default_model.clone());

    debug!(
        %model,
        attachments = request.attachments.len(),
        prompt_chars = prompt.chars().count(),
        "chat request received"
    );

    let text = gateway
        .query(&prompt, &model, &request.attachments)
        .await?;

    info!(%model, reply_chars = text.chars().count(), "chat request completed");
    Ok(Json(ChatResponse { text }))
}
