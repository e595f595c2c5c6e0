//! Domain entities for the document chat.

pub mod attachment;
pub mod message;

pub use attachment::{Attachment, CandidateFile};
pub use message::{Message, MessageRole};
