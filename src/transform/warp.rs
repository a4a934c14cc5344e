use super::SimilarityTransform;
use crate::error::{AlignError, Result};
use opencv::core::{self, Mat, Scalar, Size};
use opencv::imgproc;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};

/// How canvas pixels that map outside the generated image are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillPolicy {
    /// 4-channel BGRA output, unmapped pixels get alpha 0.
    Transparent,
    /// 3-channel BGR output, unmapped pixels get this RGB color.
    Solid([u8; 3]),
}

impl FillPolicy {
    fn border_value(&self) -> Scalar {
        match self {
            FillPolicy::Transparent => Scalar::all(0.0),
            FillPolicy::Solid([r, g, b]) => {
                Scalar::new(*b as f64, *g as f64, *r as f64, 255.0)
            }
        }
    }

    pub fn output_channels(&self) -> i32 {
        match self {
            FillPolicy::Transparent => 4,
            FillPolicy::Solid(_) => 3,
        }
    }
}

/// Resample `generated` through `transform` onto a new canvas of exactly
/// `template_size` (width, height) with bilinear interpolation.
///
/// The input is never modified. The output has 4 channels for
/// [`FillPolicy::Transparent`] and 3 for [`FillPolicy::Solid`].
pub fn warp_to_canvas(
    generated: &Mat,
    template_size: (u32, u32),
    transform: &SimilarityTransform,
    fill: FillPolicy,
) -> Result<Mat> {
    transform.check_non_degenerate()?;

    let canvas_size = canvas_dims(template_size)?;
    let (width, height) = template_size;
    if generated.empty() || generated.rows() == 0 || generated.cols() == 0 {
        return Err(AlignError::Geometry(
            "generated image has no pixels to warp".to_string(),
        ));
    }
    if generated.depth() != core::CV_8U {
        return Err(AlignError::UnsupportedImage(format!(
            "warp expects 8-bit pixels, got depth {}",
            generated.depth()
        )));
    }

    let converted;
    let source: &Mat = match conversion_code(generated.channels(), fill)? {
        Some(code) => {
            let mut dst = Mat::default();
            imgproc::cvt_color(generated, &mut dst, code, 0)?;
            converted = dst;
            &converted
        }
        None => generated,
    };

    let matrix = Mat::from_slice_2d(&transform.matrix()[..])?;
    let mut canvas = Mat::default();
    imgproc::warp_affine(
        source,
        &mut canvas,
        &matrix,
        canvas_size,
        imgproc::INTER_LINEAR,
        core::BORDER_CONSTANT,
        fill.border_value(),
    )?;

    tracing::debug!(
        source_width = generated.cols(),
        source_height = generated.rows(),
        canvas_width = width,
        canvas_height = height,
        channels = canvas.channels(),
        "Warped generated image onto template canvas"
    );
    Ok(canvas)
}

fn canvas_dims((width, height): (u32, u32)) -> Result<Size> {
    if width == 0 || height == 0 {
        return Err(AlignError::Geometry(format!(
            "canvas size {}x{} is empty",
            width, height
        )));
    }
    match (i32::try_from(width), i32::try_from(height)) {
        (Ok(w), Ok(h)) => Ok(Size::new(w, h)),
        _ => Err(AlignError::Geometry(format!(
            "canvas size {}x{} exceeds the supported range",
            width, height
        ))),
    }
}

fn conversion_code(channels: i32, fill: FillPolicy) -> Result<Option<i32>> {
    let code = match (channels, fill) {
        (4, FillPolicy::Transparent) | (3, FillPolicy::Solid(_)) => None,
        (1, FillPolicy::Transparent) => Some(imgproc::COLOR_GRAY2BGRA),
        (3, FillPolicy::Transparent) => Some(imgproc::COLOR_BGR2BGRA),
        (1, FillPolicy::Solid(_)) => Some(imgproc::COLOR_GRAY2BGR),
        (4, FillPolicy::Solid(_)) => Some(imgproc::COLOR_BGRA2BGR),
        (n, _) => {
            return Err(AlignError::UnsupportedImage(format!(
                "cannot warp an image with {n} channels"
            )))
        }
    };
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_fill_border_is_bgr_ordered() {
        let s = FillPolicy::Solid([10, 20, 30]).border_value();
        assert_eq!(s.0[0], 30.0);
        assert_eq!(s.0[1], 20.0);
        assert_eq!(s.0[2], 10.0);
    }

    #[test]
    fn oversized_canvas_is_a_geometry_error() {
        let too_wide = (i32::MAX as u32 + 1, 10);
        assert!(matches!(canvas_dims(too_wide), Err(AlignError::Geometry(_))));
        assert!(matches!(canvas_dims((10, u32::MAX)), Err(AlignError::Geometry(_))));
        assert!(matches!(canvas_dims((0, 10)), Err(AlignError::Geometry(_))));
        assert_eq!(canvas_dims((800, 600)).unwrap(), Size::new(800, 600));
    }

    #[test]
    fn conversion_matches_fill_policy() {
        assert_eq!(conversion_code(4, FillPolicy::Transparent).unwrap(), None);
        assert_eq!(
            conversion_code(3, FillPolicy::Transparent).unwrap(),
            Some(imgproc::COLOR_BGR2BGRA)
        );
        assert_eq!(
            conversion_code(4, FillPolicy::Solid([0, 0, 0])).unwrap(),
            Some(imgproc::COLOR_BGRA2BGR)
        );
        assert!(conversion_code(2, FillPolicy::Transparent).is_err());
    }
}
