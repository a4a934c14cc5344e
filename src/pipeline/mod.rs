pub mod aligner;
pub mod stage;
pub mod types;

pub use aligner::AlignmentPipeline;
pub use stage::{AlignmentState, StateTracker};
pub use types::{AlignmentOutcome, FailureKind, FallbackReason, OutcomeSummary};
