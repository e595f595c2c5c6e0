use serde::{Deserialize, Serialize};

/// Client-perceived position of a user action in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    #[default]
    Idle,
    Validating,
    Ingesting,
    Retrieving,
    Reasoning,
    Complete,
    Error,
}

impl PipelineStage {
    /// Status label shown while the stage is current. Idle shows nothing.
    pub fn label(self) -> Option<&'static str> {
        match self {
            PipelineStage::Idle => None,
            PipelineStage::Validating => Some("Verifying Constraints..."),
            PipelineStage::Ingesting => Some("Vector Ingestion..."),
            PipelineStage::Retrieving => Some("Context Retrieval..."),
            PipelineStage::Reasoning => Some("Neural Inference..."),
            PipelineStage::Complete => Some("Inference Completed"),
            PipelineStage::Error => Some("System Error"),
        }
    }

    /// Input is disabled while a stage is busy.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            PipelineStage::Validating
                | PipelineStage::Ingesting
                | PipelineStage::Retrieving
                | PipelineStage::Reasoning
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Validating => "validating",
            PipelineStage::Ingesting => "ingesting",
            PipelineStage::Retrieving => "retrieving",
            PipelineStage::Reasoning => "reasoning",
            PipelineStage::Complete => "complete",
            PipelineStage::Error => "error",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
