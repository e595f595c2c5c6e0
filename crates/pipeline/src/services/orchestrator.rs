//! Conversation orchestration: uploads, turns, retries and session state.

use std::sync::Arc;
use std::time::Duration;

use nooverfit_config::{AppConfig, ModelOption, PipelineConfig};
use nooverfit_inference::{InferenceError, InferenceErrorKind, InferenceGateway, InlineAttachment};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::notices::NoticeBoard;
use super::sequencer::{StatusSequencer, Subscription};
use super::store::AttachmentStore;
use super::validation::{PageCounter, UploadLimits, UploadValidator};
use crate::entities::{Attachment, CandidateFile, Message};
use crate::session::{
    decode_history, encode_history, MemorySessionStore, SessionStore, HISTORY_KEY, MODEL_KEY,
};
use crate::types::{PipelineError, PipelineResult, PipelineStage};

pub const CONNECTIVITY_MESSAGE: &str = "I'm having trouble connecting to the analysis engine. \
Please check your connection or ensure the backend server is running.";
pub const GENERIC_FAILURE_MESSAGE: &str = "I encountered an error processing your request.";
pub const NO_VALID_FILES: &str = "No valid files";

/// Maps an inference failure to the text shown in the conversation.
pub fn describe_failure(error: &InferenceError) -> String {
    if error.kind() == InferenceErrorKind::Connectivity {
        return CONNECTIVITY_MESSAGE.to_string();
    }

    let detail = error.detail();
    if detail.trim().is_empty() {
        GENERIC_FAILURE_MESSAGE.to_string()
    } else {
        detail
    }
}

/// Delays that pace the visible stage transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineTiming {
    pub retrieval_delay: Duration,
    pub ingest_delay: Duration,
    pub auto_idle_delay: Duration,
    pub notice_ttl: Duration,
}

impl From<&PipelineConfig> for PipelineTiming {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            retrieval_delay: Duration::from_millis(config.retrieval_delay_ms),
            ingest_delay: Duration::from_millis(config.ingest_delay_ms),
            auto_idle_delay: Duration::from_millis(config.auto_idle_delay_ms),
            notice_ttl: Duration::from_millis(config.notice_ttl_ms),
        }
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub attachments: Vec<Attachment>,
    /// Messages for files of the batch that were turned away.
    pub errors: Vec<String>,
}

pub struct ConversationOrchestrator {
    gateway: Arc<dyn InferenceGateway>,
    validator: UploadValidator,
    store: Mutex<AttachmentStore>,
    history: Mutex<Vec<Message>>,
    selected_model: Mutex<String>,
    models: Vec<ModelOption>,
    default_model: String,
    sequencer: StatusSequencer,
    notices: NoticeBoard,
    timing: PipelineTiming,
    session: Arc<dyn SessionStore>,
}

impl ConversationOrchestrator {
    pub fn new(config: &AppConfig, gateway: Arc<dyn InferenceGateway>) -> Self {
        let limits = UploadLimits::from(&config.uploads);
        let timing = PipelineTiming::from(&config.pipeline);
        let welcome = Message::welcome(limits.max_files, limits.max_pages_per_doc);

        Self {
            gateway,
            store: Mutex::new(AttachmentStore::new(limits.max_files)),
            validator: UploadValidator::new(limits),
            history: Mutex::new(vec![welcome]),
            selected_model: Mutex::new(config.inference.default_model.clone()),
            models: config.inference.models.clone(),
            default_model: config.inference.default_model.clone(),
            sequencer: StatusSequencer::new(),
            notices: NoticeBoard::new(timing.notice_ttl),
            timing,
            session: Arc::new(MemorySessionStore::new()),
        }
    }

    pub fn with_page_counter(mut self, page_counter: Arc<dyn PageCounter>) -> Self {
        self.validator = self.validator.with_page_counter(page_counter);
        self
    }

    pub fn with_session_store(mut self, session: Arc<dyn SessionStore>) -> Self {
        self.session = session;
        self
    }

    /// Loads history and model selection from the session store, falling
    /// back to a fresh session when either is missing or unusable.
    pub async fn restore(&self) {
        let history = match self.session.get(HISTORY_KEY).await {
            Ok(Some(raw)) => match decode_history(&raw) {
                Ok(messages) if !messages.is_empty() => Some(messages),
                Ok(_) => None,
                Err(err) => {
                    warn!(error = %err, "discarding unreadable chat history");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "failed to load chat history");
                None
            }
        };

        let model = match self.session.get(MODEL_KEY).await {
            Ok(Some(model)) if self.is_known_model(&model) => Some(model),
            Ok(Some(model)) => {
                warn!(%model, "ignoring unknown stored model");
                None
            }
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "failed to load selected model");
                None
            }
        };

        let restored = history.as_ref().map_or(0, Vec::len);
        *self.history.lock().await = history.unwrap_or_else(|| vec![self.welcome()]);
        *self.selected_model.lock().await = model.unwrap_or_else(|| self.default_model.clone());

        info!(messages = restored, "restored session state");
    }

    /// Validates and stages a batch of files.
    pub async fn upload(&self, files: Vec<CandidateFile>) -> PipelineResult<UploadOutcome> {
        self.sequencer.set(PipelineStage::Validating);

        let current = self.store.lock().await.list();
        let report = self.validator.validate(files, &current).await;

        if report.accepted.is_empty() {
            let errors = if report.errors.is_empty() {
                vec![NO_VALID_FILES.to_string()]
            } else {
                report.errors
            };
            self.sequencer
                .set_with_auto_idle(PipelineStage::Error, self.timing.auto_idle_delay);
            self.notices.post(errors.clone());
            return Err(PipelineError::validation(errors.join("\n")));
        }

        self.sequencer.set(PipelineStage::Ingesting);
        let added = self.store.lock().await.add(report.accepted).await;
        let attachments = match added {
            Ok(attachments) => attachments,
            Err(err) => {
                warn!(error = %err, "attachment ingestion failed");
                self.sequencer.set(PipelineStage::Error);
                self.notices.post(vec![err.to_string()]);
                return Err(err);
            }
        };

        tokio::time::sleep(self.timing.ingest_delay).await;
        self.sequencer.set(PipelineStage::Idle);
        self.notices.clear();
        self.notices.post(report.errors.clone());

        info!(
            accepted = attachments.len(),
            rejected = report.errors.len(),
            "upload staged"
        );
        Ok(UploadOutcome {
            attachments,
            errors: report.errors,
        })
    }

    /// Sends `text` with every staged attachment and returns the message
    /// appended for the reply. Inference failures produce an error-flagged
    /// message rather than an `Err`.
    pub async fn send(&self, text: &str) -> PipelineResult<Message> {
        if text.trim().is_empty() {
            return Err(PipelineError::validation("Prompt is required"));
        }

        let snapshot = {
            let mut store = self.store.lock().await;
            let snapshot = store.list();
            store.clear();
            snapshot
        };

        self.append(Message::user(text, snapshot.clone())).await;
        self.notices.clear();

        Ok(self.run_turn(text, &snapshot).await)
    }

    /// Re-runs a failed turn without attachments, replacing the error message.
    pub async fn retry(&self, original_prompt: &str) -> PipelineResult<Message> {
        if original_prompt.trim().is_empty() {
            return Err(PipelineError::validation("Prompt is required"));
        }

        {
            let mut history = self.history.lock().await;
            if history.last().is_some_and(|message| message.is_error) {
                history.pop();
            }
        }

        Ok(self.run_turn(original_prompt, &[]).await)
    }

    /// Prompt of the trailing error message, if the last turn failed.
    pub async fn last_failed_prompt(&self) -> Option<String> {
        self.history
            .lock()
            .await
            .last()
            .filter(|message| message.is_error)
            .and_then(|message| message.original_prompt.clone())
    }

    async fn run_turn(&self, prompt: &str, attachments: &[Attachment]) -> Message {
        self.sequencer.set(PipelineStage::Retrieving);
        tokio::time::sleep(self.timing.retrieval_delay).await;
        self.sequencer.set(PipelineStage::Reasoning);

        let model = self.selected_model.lock().await.clone();
        let inline: Vec<InlineAttachment> = attachments.iter().map(Attachment::to_inline).collect();
        debug!(%model, attachments = inline.len(), "dispatching turn");

        match self.gateway.query(prompt, &model, &inline).await {
            Ok(reply) => {
                let message = Message::model(reply);
                self.append(message.clone()).await;
                self.sequencer
                    .set_with_auto_idle(PipelineStage::Complete, self.timing.auto_idle_delay);
                message
            }
            Err(err) => {
                warn!(error = %err, kind = ?err.kind(), %model, "inference failed");
                let message = Message::failure(describe_failure(&err), prompt);
                self.append(message.clone()).await;
                self.sequencer.set(PipelineStage::Error);
                message
            }
        }
    }

    pub async fn select_model(&self, model: &str) -> PipelineResult<()> {
        if !self.is_known_model(model) {
            return Err(PipelineError::validation(format!("Unknown model: {model}")));
        }

        *self.selected_model.lock().await = model.to_string();
        if let Err(err) = self.session.put(MODEL_KEY, model).await {
            warn!(error = %err, "failed to persist selected model");
        }
        Ok(())
    }

    pub async fn selected_model(&self) -> String {
        self.selected_model.lock().await.clone()
    }

    pub fn models(&self) -> &[ModelOption] {
        &self.models
    }

    /// Resets the conversation to the welcome message and drops staged files.
    pub async fn new_session(&self) {
        let history = vec![self.welcome()];
        self.persist_history(&history).await;
        *self.history.lock().await = history;
        self.store.lock().await.clear();
        self.notices.clear();
        self.sequencer.set(PipelineStage::Idle);
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.history.lock().await.clone()
    }

    pub async fn attachments(&self) -> Vec<Attachment> {
        self.store.lock().await.list()
    }

    pub async fn remove_attachment(&self, id: &str) -> bool {
        self.store.lock().await.remove(id)
    }

    pub async fn clear_attachments(&self) {
        self.store.lock().await.clear();
    }

    pub fn stage(&self) -> PipelineStage {
        self.sequencer.stage()
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(PipelineStage) + Send + Sync + 'static,
    {
        self.sequencer.subscribe(observer)
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.current()
    }

    fn welcome(&self) -> Message {
        let limits = self.validator.limits();
        Message::welcome(limits.max_files, limits.max_pages_per_doc)
    }

    fn is_known_model(&self, model: &str) -> bool {
        self.models.iter().any(|option| option.id == model)
    }

    async fn append(&self, message: Message) {
        let history = {
            let mut history = self.history.lock().await;
            history.push(message);
            history.clone()
        };
        self.persist_history(&history).await;
    }

    async fn persist_history(&self, history: &[Message]) {
        let encoded = match encode_history(history) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(error = %err, "failed to encode chat history");
                return;
            }
        };

        if let Err(err) = self.session.put(HISTORY_KEY, &encoded).await {
            warn!(error = %err, "failed to persist chat history");
        }
    }
}
