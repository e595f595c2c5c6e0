//! Pipeline services.

pub mod notices;
pub mod orchestrator;
pub mod sequencer;
pub mod store;
pub mod validation;

pub use notices::NoticeBoard;
pub use orchestrator::{
    describe_failure, ConversationOrchestrator, PipelineTiming, UploadOutcome,
    CONNECTIVITY_MESSAGE, GENERIC_FAILURE_MESSAGE, NO_VALID_FILES,
};
pub use sequencer::{StatusSequencer, Subscription};
pub use store::AttachmentStore;
pub use validation::{
    PageCounter, PageProbe, PdfPageCounter, UploadLimits, UploadValidator, ValidationReport,
};
