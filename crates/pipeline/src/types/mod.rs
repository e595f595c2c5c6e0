//! Shared pipeline types.

pub mod errors;
pub mod stage;

pub use errors::{PipelineError, PipelineResult};
pub use stage::PipelineStage;
