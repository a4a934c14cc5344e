//! Haar cascade face finder followed by the LBF facemark regressor.
//!
//! Landmarks follow the iBUG 68-point layout.

use super::{select_dominant_face, Backend, FaceBounds, LandmarkDetector, LandmarkSet, SelectionThresholds};
use crate::config::LbfConfig;
use crate::error::{AlignError, Result};
use crate::transform::Point2;
use crate::utils::to_gray;
use opencv::core::{Mat, Point2f, Ptr, Rect, Size, Vector};
use opencv::face::{self, Facemark};
use opencv::imgproc;
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use std::ops::Range;
use std::path::Path;
use std::sync::Mutex;

const POINT_COUNT: usize = 68;
const EYE_A: Range<usize> = 36..42;
const EYE_B: Range<usize> = 42..48;
const INNER_LIPS: Range<usize> = 60..68;

pub struct LbfDetector {
    cascade: Mutex<CascadeClassifier>,
    facemark: Mutex<Ptr<Facemark>>,
    config: LbfConfig,
}

impl LbfDetector {
    pub fn with_config(config: LbfConfig) -> Result<Self> {
        let cascade_path = model_path_str(&config.cascade_path, "Haar cascade")?;
        let model_path = model_path_str(&config.model_path, "LBF facemark model")?;

        let cascade = CascadeClassifier::new(cascade_path)
            .map_err(|e| AlignError::Config(format!("failed to load Haar cascade: {e}")))?;
        if cascade.empty()? {
            return Err(AlignError::Config(format!(
                "Haar cascade {} loaded empty",
                config.cascade_path.display()
            )));
        }

        let mut facemark = face::create_facemark_lbf()?;
        facemark
            .load_model(model_path)
            .map_err(|e| AlignError::Config(format!("failed to load LBF model: {e}")))?;

        Ok(Self {
            cascade: Mutex::new(cascade),
            facemark: Mutex::new(facemark),
            config,
        })
    }

    pub fn config(&self) -> &LbfConfig {
        &self.config
    }

    fn thresholds(&self) -> SelectionThresholds {
        SelectionThresholds {
            min_confidence: self.config.min_neighbors as f64,
            min_face_size: self.config.min_face_size as f64,
        }
    }

    fn find_faces(&self, gray: &Mat) -> Result<(Vector<Rect>, Vec<FaceBounds>)> {
        let mut rects = Vector::<Rect>::new();
        let mut neighbours = Vector::<i32>::new();
        let mut cascade = self
            .cascade
            .lock()
            .map_err(|_| AlignError::Detection("Haar cascade lock poisoned".to_string()))?;
        cascade.detect_multi_scale2(
            gray,
            &mut rects,
            &mut neighbours,
            self.config.scale_factor,
            self.config.min_neighbors,
            0,
            Size::new(self.config.min_face_size, self.config.min_face_size),
            Size::default(),
        )?;

        let bounds = rects
            .iter()
            .zip(neighbours.iter())
            .map(|(r, n)| FaceBounds {
                x: r.x as f64,
                y: r.y as f64,
                width: r.width as f64,
                height: r.height as f64,
                confidence: n as f64,
            })
            .collect();
        Ok((rects, bounds))
    }

    fn fit(&self, gray: &Mat, face: Rect) -> Result<Vec<Point2>> {
        let mut faces = Vector::<Rect>::new();
        faces.push(face);
        let mut landmarks = Vector::<Vector<Point2f>>::new();
        let mut facemark = self
            .facemark
            .lock()
            .map_err(|_| AlignError::Detection("LBF facemark lock poisoned".to_string()))?;
        if !facemark.fit(gray, &faces, &mut landmarks)? || landmarks.is_empty() {
            return Err(AlignError::Detection("LBF facemark fit produced no shape".to_string()));
        }
        Ok(landmarks.get(0)?.iter().map(Point2::from).collect())
    }

    fn run(&self, image: &Mat) -> Result<Option<LandmarkSet>> {
        let gray = to_gray(image)?;
        let mut equalized = Mat::default();
        imgproc::equalize_hist(&gray, &mut equalized)?;

        let (rects, bounds) = self.find_faces(&equalized)?;
        let Some(index) = select_dominant_face(&bounds, &self.thresholds()) else {
            tracing::debug!(candidates = bounds.len(), "No face passed cascade thresholds");
            return Ok(None);
        };

        let points = self.fit(&gray, rects.get(index)?)?;
        tracing::debug!(
            candidates = bounds.len(),
            neighbours = bounds[index].confidence,
            "LBF face selected"
        );
        landmarks_from_68(&points, bounds[index]).map(Some)
    }
}

impl LandmarkDetector for LbfDetector {
    fn backend(&self) -> Backend {
        Backend::Lbf
    }

    #[tracing::instrument(skip_all, fields(backend = "lbf", width = image.cols(), height = image.rows()))]
    fn detect(&self, image: &Mat) -> Result<Option<LandmarkSet>> {
        self.run(image).map_err(|e| match e {
            AlignError::Detection(_) => e,
            other => AlignError::Detection(format!("LBF landmarking failed: {other}")),
        })
    }
}

fn model_path_str<'a>(path: &'a Path, what: &str) -> Result<&'a str> {
    if !path.exists() {
        return Err(AlignError::Config(format!("{what} not found: {}", path.display())));
    }
    path.to_str()
        .ok_or_else(|| AlignError::Config(format!("{what} path is not valid UTF-8: {}", path.display())))
}

/// Eye centers from the two six-point eye contours, mouth from the inner lips.
pub(crate) fn landmarks_from_68(points: &[Point2], bounds: FaceBounds) -> Result<LandmarkSet> {
    if points.len() != POINT_COUNT {
        return Err(AlignError::Detection(format!(
            "LBF returned {} points, expected {POINT_COUNT}",
            points.len()
        )));
    }
    let mean = |r: Range<usize>| {
        Point2::mean(&points[r])
            .ok_or_else(|| AlignError::Detection("empty landmark group".to_string()))
    };
    Ok(LandmarkSet::new(
        mean(EYE_A)?,
        mean(EYE_B)?,
        mean(INNER_LIPS)?,
        points.to_vec(),
        Backend::Lbf,
        bounds,
    ))
}
