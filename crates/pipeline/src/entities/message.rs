use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attachment::Attachment;

/// Represents one entry in the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique identifier
    pub id: String,
    /// Role of the message author
    pub role: MessageRole,
    /// Message body (markdown for model replies)
    pub text: String,
    /// Creation time in milliseconds since the epoch
    pub timestamp: i64,
    /// Files sent with a user message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    /// Marks a failed turn that can be retried
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    /// Prompt of the failed turn, kept for retry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_prompt: Option<String>,
}

/// Message role enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
    System,
}

impl Message {
    fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            timestamp: Utc::now().timestamp_millis(),
            attachments: None,
            is_error: false,
            original_prompt: None,
        }
    }

    pub fn user(text: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        let mut message = Self::new(MessageRole::User, text);
        message.attachments = Some(attachments);
        message
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Model, text)
    }

    pub fn failure(text: impl Into<String>, original_prompt: impl Into<String>) -> Self {
        let mut message = Self::new(MessageRole::Model, text);
        message.is_error = true;
        message.original_prompt = Some(original_prompt.into());
        message
    }

    /// Copy whose attachments keep only their metadata.
    pub fn metadata_only(&self) -> Self {
        Self {
            id: self.id.clone(),
            role: self.role,
            text: self.text.clone(),
            timestamp: self.timestamp,
            attachments: self
                .attachments
                .as_ref()
                .map(|attachments| attachments.iter().map(Attachment::metadata_only).collect()),
            is_error: self.is_error,
            original_prompt: self.original_prompt.clone(),
        }
    }

    pub fn welcome(max_files: usize, max_pages: usize) -> Self {
        let mut message = Self::new(
            MessageRole::Model,
            format!(
                "Hello. I am NoOverfit.AI. Upload your technical documents, specifications, or data files, \
                 and I will analyze them using a strict RAG pipeline. \n\n**System Constraints:**\n\
                 * Max {max_files} Documents\n* Max {max_pages} Pages per Document"
            ),
        );
        message.id = "welcome".to_string();
        message
    }
}
