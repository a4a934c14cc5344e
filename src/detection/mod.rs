//! Landmark detection backends and the coordinator that picks one of them
//! for an image pair.

pub mod coordinator;
pub mod lbf;
pub mod selection;
pub mod yunet;

pub use coordinator::{DetectedPair, DetectorCoordinator};
pub use lbf::LbfDetector;
pub use selection::{select_dominant_face, SelectionThresholds};
pub use yunet::YunetDetector;

use crate::config::DetectorConfig;
use crate::error::{AlignError, Result};
use crate::transform::Point2;
use opencv::core::Mat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two interchangeable landmark engines. `Yunet` is preferred by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// OpenCV DNN YuNet face detector with five keypoints per face.
    Yunet,
    /// Haar cascade face finder followed by the LBF 68-point facemark model.
    Lbf,
}

impl Backend {
    pub const ALL: [Backend; 2] = [Backend::Yunet, Backend::Lbf];

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Yunet => "yunet",
            Backend::Lbf => "lbf",
        }
    }

    pub fn other(&self) -> Backend {
        match self {
            Backend::Yunet => Backend::Lbf,
            Backend::Lbf => Backend::Yunet,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yunet" => Ok(Backend::Yunet),
            "lbf" => Ok(Backend::Lbf),
            other => Err(AlignError::Config(format!("unknown backend: {other}"))),
        }
    }
}

/// Bounding box of a detected face within an image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBounds {
    /// X coordinate of the top-left corner (pixels).
    pub x: f64,
    /// Y coordinate of the top-left corner (pixels).
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Backend-specific detection confidence; higher is better.
    pub confidence: f64,
}

impl FaceBounds {
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn min_side(&self) -> f64 {
        self.width.min(self.height)
    }
}

/// Canonical landmarks of one face in one image's pixel space.
///
/// Left and right are image-space: the left eye has the smaller x.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    pub left_eye_center: Point2,
    pub right_eye_center: Point2,
    pub mouth_center: Point2,
    pub raw_points: Vec<Point2>,
    pub source_backend: Backend,
    pub bounds: FaceBounds,
}

impl LandmarkSet {
    /// Builds a set from two eye centers in any order.
    pub fn new(
        eye_a: Point2,
        eye_b: Point2,
        mouth_center: Point2,
        raw_points: Vec<Point2>,
        source_backend: Backend,
        bounds: FaceBounds,
    ) -> Self {
        let (left_eye_center, right_eye_center) = if eye_a.x <= eye_b.x {
            (eye_a, eye_b)
        } else {
            (eye_b, eye_a)
        };
        Self {
            left_eye_center,
            right_eye_center,
            mouth_center,
            raw_points,
            source_backend,
            bounds,
        }
    }

    /// `[left_eye, right_eye, mouth]`, the correspondence order used by the solver.
    pub fn triplet(&self) -> [Point2; 3] {
        [self.left_eye_center, self.right_eye_center, self.mouth_center]
    }
}

/// A landmark engine. `Ok(None)` means no face passed the backend's
/// thresholds; `Err` is reserved for genuine backend faults.
pub trait LandmarkDetector: Send + Sync {
    fn backend(&self) -> Backend;

    /// Detect the dominant face in a BGR, BGRA or grayscale 8-bit image.
    fn detect(&self, image: &Mat) -> Result<Option<LandmarkSet>>;
}

/// Backends to skip for one alignment attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bypass {
    pub yunet: bool,
    pub lbf: bool,
}

impl Bypass {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            yunet: true,
            lbf: true,
        }
    }

    /// Bypass everything except `backend`.
    pub fn only(backend: Backend) -> Self {
        match backend {
            Backend::Yunet => Self {
                yunet: false,
                lbf: true,
            },
            Backend::Lbf => Self {
                yunet: true,
                lbf: false,
            },
        }
    }

    pub fn is_bypassed(&self, backend: Backend) -> bool {
        match backend {
            Backend::Yunet => self.yunet,
            Backend::Lbf => self.lbf,
        }
    }
}

/// Owns one loaded instance of each backend. Construct once per process and
/// share by reference; dropping it releases the models.
pub struct DetectorSet {
    yunet: Box<dyn LandmarkDetector>,
    lbf: Box<dyn LandmarkDetector>,
}

impl DetectorSet {
    /// Wrap already constructed detectors. Each must report the backend of
    /// the slot it is placed in.
    pub fn new(yunet: Box<dyn LandmarkDetector>, lbf: Box<dyn LandmarkDetector>) -> Result<Self> {
        if yunet.backend() != Backend::Yunet {
            return Err(AlignError::Config(format!(
                "yunet slot holds a {} detector",
                yunet.backend()
            )));
        }
        if lbf.backend() != Backend::Lbf {
            return Err(AlignError::Config(format!(
                "lbf slot holds a {} detector",
                lbf.backend()
            )));
        }
        Ok(Self { yunet, lbf })
    }

    /// Load both OpenCV backends from the model files named in `config`.
    pub fn load(config: &DetectorConfig) -> Result<Self> {
        let yunet = YunetDetector::with_config(config.yunet.clone())?;
        let lbf = LbfDetector::with_config(config.lbf.clone())?;
        tracing::info!(
            yunet_model = %config.yunet.model_path.display(),
            lbf_model = %config.lbf.model_path.display(),
            "Landmark detectors loaded"
        );
        Self::new(Box::new(yunet), Box::new(lbf))
    }

    pub fn get(&self, backend: Backend) -> &dyn LandmarkDetector {
        match backend {
            Backend::Yunet => self.yunet.as_ref(),
            Backend::Lbf => self.lbf.as_ref(),
        }
    }
}
