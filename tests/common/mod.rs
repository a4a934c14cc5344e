#![allow(dead_code)]

use face_align::detection::{Backend, DetectorSet, FaceBounds, LandmarkDetector, LandmarkSet};
use face_align::error::{AlignError, Result};
use face_align::transform::Point2;
use opencv::core::{self, Mat, Point, Scalar};
use opencv::imgproc;
use opencv::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const TEMPLATE_SIZE: (i32, i32) = (800, 600);
pub const GENERATED_SIZE: (i32, i32) = (1024, 768);

pub const TEMPLATE_POINTS: [(f64, f64); 3] = [(300.0, 250.0), (500.0, 250.0), (400.0, 450.0)];
/// Template landmarks scaled by 2 and shifted by (-290, -150).
pub const GENERATED_POINTS: [(f64, f64); 3] = [(310.0, 350.0), (710.0, 350.0), (510.0, 750.0)];

#[derive(Clone)]
pub enum Response {
    Face([(f64, f64); 3]),
    NoFace,
    Fault,
}

/// Landmark detector that answers by image size, counting its calls.
pub struct MockDetector {
    backend: Backend,
    responses: HashMap<(i32, i32), Response>,
    calls: Arc<AtomicUsize>,
}

impl MockDetector {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            responses: HashMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn respond(mut self, size: (i32, i32), response: Response) -> Self {
        self.responses.insert(size, response);
        self
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl LandmarkDetector for MockDetector {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn detect(&self, image: &Mat) -> Result<Option<LandmarkSet>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(&(image.cols(), image.rows())) {
            Some(Response::Face(points)) => Ok(Some(landmarks(self.backend, *points))),
            Some(Response::NoFace) | None => Ok(None),
            Some(Response::Fault) => Err(AlignError::Detection(format!(
                "{} model crashed",
                self.backend
            ))),
        }
    }
}

pub fn landmarks(backend: Backend, points: [(f64, f64); 3]) -> LandmarkSet {
    let [l, r, m] = points.map(|(x, y)| Point2::new(x, y));
    LandmarkSet::new(
        l,
        r,
        m,
        vec![l, r, m],
        backend,
        FaceBounds {
            x: l.x - 50.0,
            y: l.y - 80.0,
            width: r.x - l.x + 100.0,
            height: m.y - l.y + 130.0,
            confidence: 0.9,
        },
    )
}

pub fn detector_set(yunet: MockDetector, lbf: MockDetector) -> DetectorSet {
    DetectorSet::new(Box::new(yunet), Box::new(lbf)).expect("mock backends match their slots")
}

/// Both backends find the canonical landmarks in template and generated images.
pub fn agreeing_detectors() -> DetectorSet {
    detector_set(
        MockDetector::new(Backend::Yunet)
            .respond(TEMPLATE_SIZE, Response::Face(TEMPLATE_POINTS))
            .respond(GENERATED_SIZE, Response::Face(GENERATED_POINTS)),
        MockDetector::new(Backend::Lbf)
            .respond(TEMPLATE_SIZE, Response::Face(TEMPLATE_POINTS))
            .respond(GENERATED_SIZE, Response::Face(GENERATED_POINTS)),
    )
}

pub fn blank(size: (i32, i32), typ: i32) -> Mat {
    Mat::new_rows_cols_with_default(size.1, size.0, typ, Scalar::all(0.0)).unwrap()
}

/// Black BGR image with white dots at `points`.
pub fn dotted(size: (i32, i32), points: &[(f64, f64)], radius: i32) -> Mat {
    let mut img = blank(size, core::CV_8UC3);
    for (x, y) in points {
        imgproc::circle(
            &mut img,
            Point::new(*x as i32, *y as i32),
            radius,
            Scalar::all(255.0),
            -1,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
    }
    img
}

pub fn channel_at(mat: &Mat, x: i32, y: i32, channel: usize) -> u8 {
    match mat.channels() {
        1 => *mat.at_2d::<u8>(y, x).unwrap(),
        3 => mat.at_2d::<core::Vec3b>(y, x).unwrap().0[channel],
        4 => mat.at_2d::<core::Vec4b>(y, x).unwrap().0[channel],
        n => panic!("unexpected channel count {n}"),
    }
}
