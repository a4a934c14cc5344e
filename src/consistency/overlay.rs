use crate::detection::LandmarkSet;
use crate::error::{AlignError, Result};
use crate::transform::Point2;
use crate::utils::ensure_bgr;
use opencv::core::{self, Mat, Point, Scalar, Size, Vector};
use opencv::imgproc;
use opencv::prelude::*;

const PANEL_GAP: i32 = 10;
const LABEL_BAND: i32 = 40;

fn marker_color() -> Scalar {
    // BGR (0, 255, 127)
    Scalar::new(0.0, 255.0, 127.0, 0.0)
}

fn pixel(p: &Point2) -> Point {
    Point::new(p.x.round() as i32, p.y.round() as i32)
}

/// BGR copy of `image` with the raw points, the three centers and the
/// eye-midpoint to mouth line drawn on top.
pub fn render_overlay(image: &Mat, landmarks: &LandmarkSet) -> Result<Mat> {
    let mut canvas = ensure_bgr(image)?;
    let color = marker_color();

    for p in &landmarks.raw_points {
        imgproc::circle(&mut canvas, pixel(p), 4, color, -1, imgproc::LINE_8, 0)?;
        imgproc::circle(&mut canvas, pixel(p), 6, color, 2, imgproc::LINE_8, 0)?;
    }
    for c in landmarks.triplet() {
        imgproc::circle(&mut canvas, pixel(&c), 8, color, -1, imgproc::LINE_8, 0)?;
        imgproc::circle(&mut canvas, pixel(&c), 10, color, 2, imgproc::LINE_8, 0)?;
    }

    let eyes = landmarks.left_eye_center.midpoint(&landmarks.right_eye_center);
    imgproc::line(
        &mut canvas,
        pixel(&eyes),
        pixel(&landmarks.mouth_center),
        color,
        2,
        imgproc::LINE_8,
        0,
    )?;
    Ok(canvas)
}

/// Labelled panels side by side on a white strip, each scaled to
/// `panel_height` with its aspect ratio kept.
pub fn render_composite(panels: &[(&str, &Mat)], panel_height: i32) -> Result<Mat> {
    if panels.is_empty() {
        return Err(AlignError::UnsupportedImage("composite needs at least one panel".to_string()));
    }
    if panel_height <= 0 {
        return Err(AlignError::UnsupportedImage(format!(
            "composite panel height {panel_height} is not positive"
        )));
    }

    let white = Scalar::all(255.0);
    let mut strip = Vector::<Mat>::new();
    for (label, image) in panels {
        let bgr = ensure_bgr(image)?;
        let width = ((bgr.cols() as f64 * panel_height as f64 / bgr.rows() as f64).round() as i32).max(1);
        let mut resized = Mat::default();
        imgproc::resize(
            &bgr,
            &mut resized,
            Size::new(width, panel_height),
            0.0,
            0.0,
            imgproc::INTER_AREA,
        )?;

        let mut panel = Mat::default();
        core::copy_make_border(
            &resized,
            &mut panel,
            LABEL_BAND,
            PANEL_GAP,
            PANEL_GAP,
            0,
            core::BORDER_CONSTANT,
            white,
        )?;
        imgproc::put_text(
            &mut panel,
            label,
            Point::new(PANEL_GAP, 25),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.7,
            Scalar::all(0.0),
            2,
            imgproc::LINE_8,
            false,
        )?;
        strip.push(panel);
    }

    let mut joined = Mat::default();
    core::hconcat(&strip, &mut joined)?;
    let mut composite = Mat::default();
    core::copy_make_border(&joined, &mut composite, 0, 0, 0, PANEL_GAP, core::BORDER_CONSTANT, white)?;
    Ok(composite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Backend, FaceBounds};
    use opencv::core::Vec3b;

    #[test]
    fn draws_markers_on_a_bgr_copy() {
        let image = Mat::new_rows_cols_with_default(100, 100, core::CV_8UC4, Scalar::all(0.0)).unwrap();
        let set = LandmarkSet::new(
            Point2::new(30.0, 40.0),
            Point2::new(70.0, 40.0),
            Point2::new(50.0, 75.0),
            vec![Point2::new(30.0, 40.0)],
            Backend::Yunet,
            FaceBounds {
                x: 10.0,
                y: 10.0,
                width: 80.0,
                height: 80.0,
                confidence: 0.9,
            },
        );
        let out = render_overlay(&image, &set).unwrap();
        assert_eq!(out.channels(), 3);
        assert_eq!(out.rows(), 100);
        let center = out.at_2d::<Vec3b>(40, 30).unwrap();
        assert_eq!(center.0, [0, 255, 127]);
        let corner = out.at_2d::<Vec3b>(0, 99).unwrap();
        assert_eq!(corner.0, [0, 0, 0]);
        assert_eq!(image.channels(), 4);
    }

    #[test]
    fn composite_scales_panels_to_one_height() {
        let red = Mat::new_rows_cols_with_default(50, 100, core::CV_8UC3, Scalar::new(0.0, 0.0, 255.0, 0.0)).unwrap();
        let gray = Mat::new_rows_cols_with_default(60, 60, core::CV_8UC1, Scalar::all(0.0)).unwrap();

        let out = render_composite(&[("template", &red), ("aligned", &gray)], 100).unwrap();
        assert_eq!(out.channels(), 3);
        assert_eq!(out.rows(), 100 + LABEL_BAND + PANEL_GAP);
        assert_eq!(out.cols(), PANEL_GAP + 200 + PANEL_GAP + 100 + PANEL_GAP);

        let inside_first = out.at_2d::<Vec3b>(LABEL_BAND + 50, PANEL_GAP + 100).unwrap();
        assert_eq!(inside_first.0, [0, 0, 255]);
        let inside_second = out.at_2d::<Vec3b>(LABEL_BAND + 50, 2 * PANEL_GAP + 250).unwrap();
        assert_eq!(inside_second.0, [0, 0, 0]);
        let gap = out.at_2d::<Vec3b>(LABEL_BAND + 50, 5).unwrap();
        assert_eq!(gap.0, [255, 255, 255]);
    }

    #[test]
    fn composite_rejects_empty_input() {
        assert!(render_composite(&[], 100).is_err());
        let image = Mat::new_rows_cols_with_default(10, 10, core::CV_8UC3, Scalar::all(0.0)).unwrap();
        assert!(render_composite(&[("x", &image)], 0).is_err());
    }
}
