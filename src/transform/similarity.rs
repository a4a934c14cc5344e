use super::Point2;
use crate::error::{AlignError, Result};
use opencv::core::{self, Mat};
use opencv::prelude::*;
use serde::{Deserialize, Serialize};

/// Minimum ratio of twice the triangle area to the squared spread about the
/// centroid. Below it a point triple is treated as collinear.
pub const COLLINEARITY_TOLERANCE: f64 = 1e-6;

/// Smallest scale a transform may carry before it is considered singular.
pub const MIN_SCALE: f64 = 1e-6;

/// Rotation + uniform scale + translation. Maps generated-image coordinates
/// into template-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityTransform {
    /// Radians; positive angles turn the +x axis toward +y.
    pub rotation: f64,
    pub scale: f64,
    pub translation: (f64, f64),
}

impl SimilarityTransform {
    pub fn new(rotation: f64, scale: f64, translation: (f64, f64)) -> Self {
        Self {
            rotation,
            scale,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self::new(0.0, 1.0, (0.0, 0.0))
    }

    pub fn rotation_degrees(&self) -> f64 {
        self.rotation.to_degrees()
    }

    /// The 2×3 forward matrix `[[a, -b, tx], [b, a, ty]]`.
    pub fn matrix(&self) -> [[f64; 3]; 2] {
        let a = self.scale * self.rotation.cos();
        let b = self.scale * self.rotation.sin();
        [
            [a, -b, self.translation.0],
            [b, a, self.translation.1],
        ]
    }

    pub fn apply(&self, p: &Point2) -> Point2 {
        let m = self.matrix();
        Point2::new(
            m[0][0] * p.x + m[0][1] * p.y + m[0][2],
            m[1][0] * p.x + m[1][1] * p.y + m[1][2],
        )
    }

    /// Rejects transforms that would collapse or blow up the image.
    pub fn check_non_degenerate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale.abs() < MIN_SCALE {
            return Err(AlignError::Geometry(format!(
                "transform scale {} is zero or not finite",
                self.scale
            )));
        }
        if !self.rotation.is_finite()
            || !self.translation.0.is_finite()
            || !self.translation.1.is_finite()
        {
            return Err(AlignError::Geometry(
                "transform has non-finite rotation or translation".to_string(),
            ));
        }
        Ok(())
    }
}

/// Least-squares similarity transform mapping `generated_points` onto
/// `template_points`. Both triples are `[left_eye, right_eye, mouth]`.
///
/// Rotation comes from the SVD of the cross-covariance of the centered
/// triples (with reflection removed), scale is the ratio of their Frobenius
/// spreads, and the translation aligns the centroids.
pub fn compute_similarity_transform(
    template_points: &[Point2; 3],
    generated_points: &[Point2; 3],
) -> Result<SimilarityTransform> {
    check_triangle(template_points, "template")?;
    check_triangle(generated_points, "generated")?;

    let t_centroid = centroid(template_points);
    let g_centroid = centroid(generated_points);

    let mut cross_cov = [[0.0f64; 2]; 2];
    let mut t_spread = 0.0;
    let mut g_spread = 0.0;
    for (t, g) in template_points.iter().zip(generated_points.iter()) {
        let tc = *t - t_centroid;
        let gc = *g - g_centroid;
        cross_cov[0][0] += tc.x * gc.x;
        cross_cov[0][1] += tc.x * gc.y;
        cross_cov[1][0] += tc.y * gc.x;
        cross_cov[1][1] += tc.y * gc.y;
        t_spread += tc.x * tc.x + tc.y * tc.y;
        g_spread += gc.x * gc.x + gc.y * gc.y;
    }

    let rotation = optimal_rotation(&cross_cov)?;
    let scale = t_spread.sqrt() / g_spread.sqrt();

    let (cos, sin) = (rotation.cos(), rotation.sin());
    let rotated_x = scale * (cos * g_centroid.x - sin * g_centroid.y);
    let rotated_y = scale * (sin * g_centroid.x + cos * g_centroid.y);
    let transform = SimilarityTransform::new(
        rotation,
        scale,
        (t_centroid.x - rotated_x, t_centroid.y - rotated_y),
    );
    transform.check_non_degenerate()?;

    tracing::debug!(
        rotation_degrees = transform.rotation_degrees(),
        scale = transform.scale,
        tx = transform.translation.0,
        ty = transform.translation.1,
        "Similarity transform solved"
    );
    Ok(transform)
}

fn centroid(points: &[Point2; 3]) -> Point2 {
    Point2::new(
        (points[0].x + points[1].x + points[2].x) / 3.0,
        (points[0].y + points[1].y + points[2].y) / 3.0,
    )
}

fn check_triangle(points: &[Point2; 3], which: &str) -> Result<()> {
    if points.iter().any(|p| !p.is_finite()) {
        return Err(AlignError::Geometry(format!(
            "{which} landmarks contain non-finite coordinates"
        )));
    }

    let c = centroid(points);
    let spread_sq: f64 = points
        .iter()
        .map(|p| {
            let d = *p - c;
            d.x * d.x + d.y * d.y
        })
        .sum();
    let e1 = points[1] - points[0];
    let e2 = points[2] - points[0];
    let twice_area = (e1.x * e2.y - e1.y * e2.x).abs();

    if spread_sq <= 0.0 || twice_area <= COLLINEARITY_TOLERANCE * spread_sq {
        return Err(AlignError::Geometry(format!(
            "{which} landmarks are collinear or coincident"
        )));
    }
    Ok(())
}

/// Angle of the proper rotation `U · diag(1, d) · Vᵀ` for `H = U Σ Vᵀ`.
fn optimal_rotation(cross_cov: &[[f64; 2]; 2]) -> Result<f64> {
    let h = Mat::from_slice_2d(&cross_cov[..])?;
    let mut w = Mat::default();
    let mut u = Mat::default();
    let mut vt = Mat::default();
    core::sv_decomp(&h, &mut w, &mut u, &mut vt, 0)?;

    let u = read_2x2(&u)?;
    let vt = read_2x2(&vt)?;

    let det_u = u[0][0] * u[1][1] - u[0][1] * u[1][0];
    let det_vt = vt[0][0] * vt[1][1] - vt[0][1] * vt[1][0];
    let d = if det_u * det_vt < 0.0 { -1.0 } else { 1.0 };

    // R = U · diag(1, d) · Vᵀ
    let r00 = u[0][0] * vt[0][0] + d * u[0][1] * vt[1][0];
    let r10 = u[1][0] * vt[0][0] + d * u[1][1] * vt[1][0];

    let angle = r10.atan2(r00);
    if !angle.is_finite() {
        return Err(AlignError::Geometry(
            "rotation from cross-covariance is not finite".to_string(),
        ));
    }
    Ok(angle)
}

fn read_2x2(m: &Mat) -> Result<[[f64; 2]; 2]> {
    if m.rows() != 2 || m.cols() != 2 {
        return Err(AlignError::Geometry(format!(
            "expected 2x2 SVD factor, got {}x{}",
            m.rows(),
            m.cols()
        )));
    }
    Ok([
        [*m.at_2d::<f64>(0, 0)?, *m.at_2d::<f64>(0, 1)?],
        [*m.at_2d::<f64>(1, 0)?, *m.at_2d::<f64>(1, 1)?],
    ])
}
