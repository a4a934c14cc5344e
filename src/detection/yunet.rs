//! YuNet face detector (OpenCV DNN). Emits one row of 15 floats per face:
//! box (x, y, w, h), five keypoints (two eyes, nose tip, two mouth corners)
//! and a score.

use super::{select_dominant_face, Backend, FaceBounds, LandmarkDetector, LandmarkSet, SelectionThresholds};
use crate::config::YunetConfig;
use crate::error::{AlignError, Result};
use crate::transform::Point2;
use crate::utils::ensure_bgr;
use opencv::core::{Mat, Ptr, Size};
use opencv::objdetect::FaceDetectorYN;
use opencv::prelude::*;
use std::sync::Mutex;

const ROW_LEN: usize = 15;

pub struct YunetDetector {
    detector: Mutex<Ptr<FaceDetectorYN>>,
    config: YunetConfig,
}

impl YunetDetector {
    pub fn with_config(config: YunetConfig) -> Result<Self> {
        let model = config.model_path.to_str().ok_or_else(|| {
            AlignError::Config(format!(
                "YuNet model path is not valid UTF-8: {}",
                config.model_path.display()
            ))
        })?;
        if !config.model_path.exists() {
            return Err(AlignError::Config(format!(
                "YuNet model not found: {}",
                config.model_path.display()
            )));
        }

        let detector = FaceDetectorYN::create(
            model,
            "",
            Size::new(320, 320),
            config.score_threshold,
            config.nms_threshold,
            config.top_k,
            0,
            0,
        )
        .map_err(|e| AlignError::Config(format!("failed to load YuNet model: {e}")))?;

        Ok(Self {
            detector: Mutex::new(detector),
            config,
        })
    }

    pub fn config(&self) -> &YunetConfig {
        &self.config
    }

    fn thresholds(&self) -> SelectionThresholds {
        SelectionThresholds {
            min_confidence: self.config.score_threshold as f64,
            min_face_size: self.config.min_face_size,
        }
    }

    fn run(&self, image: &Mat) -> Result<Mat> {
        let bgr = ensure_bgr(image)?;
        let mut detector = self
            .detector
            .lock()
            .map_err(|_| AlignError::Detection("YuNet detector lock poisoned".to_string()))?;
        detector.set_input_size(Size::new(bgr.cols(), bgr.rows()))?;
        let mut faces = Mat::default();
        detector.detect(&bgr, &mut faces)?;
        Ok(faces)
    }
}

impl LandmarkDetector for YunetDetector {
    fn backend(&self) -> Backend {
        Backend::Yunet
    }

    #[tracing::instrument(skip_all, fields(backend = "yunet", width = image.cols(), height = image.rows()))]
    fn detect(&self, image: &Mat) -> Result<Option<LandmarkSet>> {
        let faces = self
            .run(image)
            .map_err(|e| AlignError::Detection(format!("YuNet inference failed: {e}")))?;

        let mut parsed = Vec::new();
        for i in 0..faces.rows() {
            let row = faces
                .at_row::<f32>(i)
                .map_err(|e| AlignError::Detection(format!("unreadable YuNet output row {i}: {e}")))?;
            parsed.push(parse_face_row(row)?);
        }

        let bounds: Vec<FaceBounds> = parsed.iter().map(|(b, _)| *b).collect();
        let Some(index) = select_dominant_face(&bounds, &self.thresholds()) else {
            tracing::debug!(candidates = parsed.len(), "No face passed YuNet thresholds");
            return Ok(None);
        };

        let candidates = parsed.len();
        let (bounds, keypoints) = parsed.swap_remove(index);
        tracing::debug!(candidates, confidence = bounds.confidence, "YuNet face selected");
        Ok(Some(landmarks_from_keypoints(bounds, keypoints)))
    }
}

/// Split one YuNet output row into the face box and its five keypoints.
pub(crate) fn parse_face_row(row: &[f32]) -> Result<(FaceBounds, [Point2; 5])> {
    if row.len() < ROW_LEN {
        return Err(AlignError::Detection(format!(
            "YuNet row has {} values, expected {ROW_LEN}",
            row.len()
        )));
    }
    let v = |i: usize| row[i] as f64;
    let bounds = FaceBounds {
        x: v(0),
        y: v(1),
        width: v(2),
        height: v(3),
        confidence: v(14),
    };
    let mut keypoints = [Point2::default(); 5];
    for (k, kp) in keypoints.iter_mut().enumerate() {
        *kp = Point2::new(v(4 + 2 * k), v(5 + 2 * k));
    }
    Ok((bounds, keypoints))
}

/// Keypoint order: eye, eye, nose tip, mouth corner, mouth corner.
pub(crate) fn landmarks_from_keypoints(bounds: FaceBounds, keypoints: [Point2; 5]) -> LandmarkSet {
    let mouth = keypoints[3].midpoint(&keypoints[4]);
    LandmarkSet::new(
        keypoints[0],
        keypoints[1],
        mouth,
        keypoints.to_vec(),
        Backend::Yunet,
        bounds,
    )
}
