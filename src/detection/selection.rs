//! Dominant-face selection shared by both backends.
//!
//! Policy: discard candidates below the confidence or size thresholds, then
//! keep the highest confidence. Equal confidences go to the larger box.

use super::FaceBounds;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionThresholds {
    pub min_confidence: f64,
    /// Shorter side of the face box, in pixels.
    pub min_face_size: f64,
}

impl Default for SelectionThresholds {
    fn default() -> Self {
        Self {
            min_confidence: 0.0,
            min_face_size: 0.0,
        }
    }
}

/// Index of the dominant face among `candidates`, or `None` when nothing
/// passes the thresholds.
pub fn select_dominant_face(
    candidates: &[FaceBounds],
    thresholds: &SelectionThresholds,
) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            c.confidence.is_finite()
                && c.confidence >= thresholds.min_confidence
                && c.min_side() >= thresholds.min_face_size
        })
        .max_by(|(_, a), (_, b)| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.area().partial_cmp(&b.area()).unwrap_or(Ordering::Equal))
        })
        .map(|(i, _)| i)
}
