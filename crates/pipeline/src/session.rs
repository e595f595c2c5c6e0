//! Key-value persistence for conversation state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::entities::Message;
use crate::types::PipelineResult;

/// Key holding the JSON-encoded message history.
pub const HISTORY_KEY: &str = "nooverfit_chat_history_v1";
/// Key holding the selected model id.
pub const MODEL_KEY: &str = "nooverfit_selected_model_v1";

/// Encodes history for storage. Attachments are reduced to their metadata,
/// so the stored value does not grow with file sizes.
pub fn encode_history(history: &[Message]) -> PipelineResult<String> {
    let stored: Vec<Message> = history.iter().map(Message::metadata_only).collect();
    Ok(serde_json::to_string(&stored)?)
}

pub fn decode_history(raw: &str) -> PipelineResult<Vec<Message>> {
    Ok(serde_json::from_str(raw)?)
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> PipelineResult<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> PipelineResult<()>;
}

/// In-process store; state is lost when the process exits.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> PipelineResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> PipelineResult<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
