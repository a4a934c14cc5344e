use super::AlignmentState;
use crate::detection::Backend;
use crate::error::AlignError;
use crate::transform::SimilarityTransform;
use opencv::core::Mat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Detection,
    Geometry,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Detection => f.write_str("detection"),
            FailureKind::Geometry => f.write_str("geometry"),
        }
    }
}

/// Why an attempt fell back to the unaligned image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackReason {
    /// State the attempt was in when it failed.
    pub stage: AlignmentState,
    pub kind: FailureKind,
    pub message: String,
}

impl FallbackReason {
    /// `None` for errors that are not recoverable.
    pub fn from_error(stage: AlignmentState, error: &AlignError) -> Option<Self> {
        let kind = match error {
            AlignError::Detection(_) => FailureKind::Detection,
            AlignError::Geometry(_) => FailureKind::Geometry,
            _ => return None,
        };
        Some(Self {
            stage,
            kind,
            message: error.to_string(),
        })
    }
}

/// Result of one alignment attempt, aligned or not.
#[derive(Debug)]
pub struct AlignmentOutcome {
    pub success: bool,
    pub backend_used: Option<Backend>,
    pub transform: Option<SimilarityTransform>,
    /// Always the template's `(width, height)`.
    pub canvas_size: (u32, u32),
    /// The warped image, or the untouched generated image on fallback.
    pub output: Mat,
    pub final_state: AlignmentState,
    /// Every state visited, starting at `NotStarted`.
    pub state_history: Vec<AlignmentState>,
    pub fallback: Option<FallbackReason>,
    pub correlation_id: Uuid,
}

impl AlignmentOutcome {
    pub fn summary(&self) -> OutcomeSummary {
        OutcomeSummary {
            success: self.success,
            backend_used: self.backend_used,
            transform: self.transform,
            canvas_size: self.canvas_size,
            final_state: self.final_state,
            state_history: self.state_history.clone(),
            fallback: self.fallback.clone(),
            correlation_id: self.correlation_id,
            generated_path: None,
            output_path: None,
        }
    }
}

/// Everything in an [`AlignmentOutcome`] except pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub success: bool,
    pub backend_used: Option<Backend>,
    pub transform: Option<SimilarityTransform>,
    pub canvas_size: (u32, u32),
    pub final_state: AlignmentState,
    #[serde(default)]
    pub state_history: Vec<AlignmentState>,
    pub fallback: Option<FallbackReason>,
    pub correlation_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub generated_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output_path: Option<PathBuf>,
}

impl OutcomeSummary {
    pub fn with_paths(mut self, generated: &Path, output: &Path) -> Self {
        self.generated_path = Some(generated.to_path_buf());
        self.output_path = Some(output.to_path_buf());
        self
    }
}
