//! Geometry for face alignment: point type, similarity transform estimation
//! and canvas warping.

pub mod similarity;
pub mod warp;

pub use similarity::{compute_similarity_transform, SimilarityTransform};
pub use warp::{warp_to_canvas, FillPolicy};

use serde::{Deserialize, Serialize};

/// A 2D point in pixel coordinates of one specific image.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self, other: &Point2) -> Point2 {
        Point2::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Arithmetic mean of a point set, `None` when empty.
    pub fn mean(points: &[Point2]) -> Option<Point2> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let (sx, sy) = points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point2::new(sx / n, sy / n))
    }
}

impl std::ops::Sub for Point2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Point2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Add for Point2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Point2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl From<opencv::core::Point2f> for Point2 {
    fn from(p: opencv::core::Point2f) -> Self {
        Point2::new(p.x as f64, p.y as f64)
    }
}
