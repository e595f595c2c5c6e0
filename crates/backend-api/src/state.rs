use std::sync::Arc;

use nooverfit_config::AppConfig;
use nooverfit_inference::{InferenceError, InferenceGateway};

use crate::ApiError;

#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    gateway: Option<Arc<dyn InferenceGateway>>,
}

impl AppState {
    /// `gateway` is `None` when the server started without an upstream
    /// credential; chat requests then fail with a configuration error.
    pub fn new(config: Arc<AppConfig>, gateway: Option<Arc<dyn InferenceGateway>>) -> Self {
        Self { config, gateway }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn gateway(&self) -> Result<&Arc<dyn InferenceGateway>, ApiError> {
        self.gateway
            .as_ref()
            .ok_or_else(|| ApiError::from(InferenceError::MissingCredential))
    }
}
