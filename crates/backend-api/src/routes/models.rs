use axum::{extract::State, Json};
use nooverfit_inference::is_thinking_model;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ModelSummary {
    pub id: String,
    pub name: String,
    pub thinking: bool,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub default: String,
    pub models: Vec<ModelSummary>,
}

pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let inference = &state.config().inference;
    let models = inference
        .models
        .iter()
        .map(|model| ModelSummary {
            id: model.id.clone(),
            name: model.name.clone(),
            thinking: is_thinking_model(&model.id),
        })
        .collect();

    Json(ModelsResponse {
        default: inference.default_model.clone(),
        models,
    })
}
