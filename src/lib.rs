//! Landmark-based face alignment: place a generated face onto the face of a
//! template image with a least-squares similarity transform.

pub mod config;
pub mod consistency;
pub mod detection;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod transform;
pub mod utils;

pub use config::Config;
pub use consistency::{ConsistencyReport, ConsistencyValidator};
pub use detection::{Backend, Bypass, DetectorCoordinator, DetectorSet, LandmarkDetector, LandmarkSet};
pub use error::{AlignError, Result};
pub use pipeline::{AlignmentOutcome, AlignmentPipeline, AlignmentState, OutcomeSummary};
pub use transform::{compute_similarity_transform, warp_to_canvas, FillPolicy, Point2, SimilarityTransform};
