//! # NoOverfit Pipeline Crate
//!
//! Client-side half of the document chat: everything that happens between a
//! user picking files and a reply landing in the conversation.
//!
//! ## Architecture
//!
//! - **Entities**: attachments, candidate files and chat messages
//! - **Services**: upload validation, the attachment store, the status
//!   sequencer, transient notices and the conversation orchestrator
//! - **Session**: key-value persistence of history and model selection
//! - **Types**: pipeline stages and errors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nooverfit_pipeline::{CandidateFile, ConversationOrchestrator};
//!
//! let orchestrator = ConversationOrchestrator::new(&config, gateway);
//! orchestrator.upload(vec![CandidateFile::from_path("manual.pdf").await?]).await;
//! let reply = orchestrator.send("Summarize").await?;
//! ```

pub mod entities;
pub mod services;
pub mod session;
pub mod types;

pub use entities::{Attachment, CandidateFile, Message, MessageRole};
pub use services::{
    describe_failure, AttachmentStore, ConversationOrchestrator, NoticeBoard, PageCounter,
    PageProbe, PdfPageCounter, PipelineTiming, StatusSequencer, Subscription, UploadLimits,
    UploadOutcome, UploadValidator, ValidationReport, CONNECTIVITY_MESSAGE,
    GENERIC_FAILURE_MESSAGE, NO_VALID_FILES,
};
pub use session::{
    decode_history, encode_history, MemorySessionStore, SessionStore, HISTORY_KEY, MODEL_KEY,
};
pub use types::{PipelineError, PipelineResult, PipelineStage};
