use crate::error::{AlignError, Result};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use opencv::core::{self, Mat, Scalar};
use opencv::imgproc;
use opencv::prelude::*;
use std::path::Path;

/// Decode an image file into an 8-bit OpenCV Mat.
///
/// Grayscale files become 1-channel, files with alpha become BGRA and
/// everything else BGR.
pub fn load_image(path: &Path) -> Result<Mat> {
    let img = image::open(path).map_err(|source| AlignError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(
        path = %path.display(),
        width = img.width(),
        height = img.height(),
        color = ?img.color(),
        "Decoded image"
    );
    dynamic_to_mat(&img)
}

/// Encode `mat` to `path`, format chosen from the extension.
///
/// Alpha is dropped for formats that cannot store it.
pub fn save_image(mat: &Mat, path: &Path) -> Result<()> {
    let mut img = mat_to_dynamic(mat)?;
    if img.color().has_alpha() && !format_supports_alpha(path) {
        img = DynamicImage::ImageRgb8(img.to_rgb8());
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    img.save(path).map_err(|source| AlignError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "Encoded image");
    Ok(())
}

/// Whether the format implied by the file extension keeps an alpha channel.
pub fn format_supports_alpha(path: &Path) -> bool {
    matches!(
        ImageFormat::from_path(path),
        Ok(ImageFormat::Png | ImageFormat::WebP | ImageFormat::Tiff | ImageFormat::Tga)
    )
}

/// Convert a decoded image into a BGR, BGRA or gray Mat.
pub fn dynamic_to_mat(img: &DynamicImage) -> Result<Mat> {
    let (width, height) = (img.width() as i32, img.height() as i32);
    if width == 0 || height == 0 {
        return Err(AlignError::UnsupportedImage(format!(
            "image has zero size {}x{}",
            width, height
        )));
    }

    let color = img.color();
    if color.has_alpha() {
        let rgba = img.to_rgba8();
        let src = mat_from_bytes(height, width, core::CV_8UC4, rgba.as_raw())?;
        let mut bgra = Mat::default();
        imgproc::cvt_color(&src, &mut bgra, imgproc::COLOR_RGBA2BGRA, 0)?;
        Ok(bgra)
    } else if color.channel_count() == 1 {
        let gray = img.to_luma8();
        mat_from_bytes(height, width, core::CV_8UC1, gray.as_raw())
    } else {
        let rgb = img.to_rgb8();
        let src = mat_from_bytes(height, width, core::CV_8UC3, rgb.as_raw())?;
        let mut bgr = Mat::default();
        imgproc::cvt_color(&src, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
        Ok(bgr)
    }
}

/// Convert an 8-bit 1, 3 or 4 channel Mat back into an `image` buffer.
pub fn mat_to_dynamic(mat: &Mat) -> Result<DynamicImage> {
    if mat.empty() {
        return Err(AlignError::UnsupportedImage("cannot encode an empty Mat".to_string()));
    }
    if mat.depth() != core::CV_8U {
        return Err(AlignError::UnsupportedImage(format!(
            "expected 8-bit pixels, got depth {}",
            mat.depth()
        )));
    }

    let (width, height) = (mat.cols() as u32, mat.rows() as u32);
    let too_short = || AlignError::UnsupportedImage("Mat buffer shorter than its shape".to_string());

    match mat.channels() {
        1 => {
            let owned;
            let src = if mat.is_continuous() {
                mat
            } else {
                owned = mat.try_clone()?;
                &owned
            };
            let buf = GrayImage::from_raw(width, height, src.data_bytes()?.to_vec())
                .ok_or_else(too_short)?;
            Ok(DynamicImage::ImageLuma8(buf))
        }
        3 => {
            let mut rgb = Mat::default();
            imgproc::cvt_color(mat, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
            let buf = RgbImage::from_raw(width, height, rgb.data_bytes()?.to_vec())
                .ok_or_else(too_short)?;
            Ok(DynamicImage::ImageRgb8(buf))
        }
        4 => {
            let mut rgba = Mat::default();
            imgproc::cvt_color(mat, &mut rgba, imgproc::COLOR_BGRA2RGBA, 0)?;
            let buf = RgbaImage::from_raw(width, height, rgba.data_bytes()?.to_vec())
                .ok_or_else(too_short)?;
            Ok(DynamicImage::ImageRgba8(buf))
        }
        n => Err(AlignError::UnsupportedImage(format!(
            "cannot convert a {n}-channel Mat"
        ))),
    }
}

/// 3-channel BGR view of an 8-bit image, converting from gray or BGRA.
pub fn ensure_bgr(mat: &Mat) -> Result<Mat> {
    convert_channels(mat, 3)
}

/// Single-channel view of an 8-bit image.
pub fn to_gray(mat: &Mat) -> Result<Mat> {
    convert_channels(mat, 1)
}

fn convert_channels(mat: &Mat, wanted: i32) -> Result<Mat> {
    if mat.empty() {
        return Err(AlignError::UnsupportedImage("image has no pixels".to_string()));
    }
    let code = match (mat.channels(), wanted) {
        (a, b) if a == b => return Ok(mat.try_clone()?),
        (1, 3) => imgproc::COLOR_GRAY2BGR,
        (4, 3) => imgproc::COLOR_BGRA2BGR,
        (3, 1) => imgproc::COLOR_BGR2GRAY,
        (4, 1) => imgproc::COLOR_BGRA2GRAY,
        (n, _) => {
            return Err(AlignError::UnsupportedImage(format!(
                "cannot convert a {n}-channel image to {wanted} channels"
            )))
        }
    };
    let mut out = Mat::default();
    imgproc::cvt_color(mat, &mut out, code, 0)?;
    Ok(out)
}

/// `(width, height)` of a Mat in pixels.
pub fn mat_size(mat: &Mat) -> (u32, u32) {
    (mat.cols().max(0) as u32, mat.rows().max(0) as u32)
}

fn mat_from_bytes(rows: i32, cols: i32, typ: i32, bytes: &[u8]) -> Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(rows, cols, typ, Scalar::all(0.0))?;
    let dst = mat.data_bytes_mut()?;
    if dst.len() != bytes.len() {
        return Err(AlignError::UnsupportedImage(format!(
            "pixel buffer holds {} bytes, expected {}",
            bytes.len(),
            dst.len()
        )));
    }
    dst.copy_from_slice(bytes);
    Ok(mat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};
    use std::path::PathBuf;

    #[test]
    fn rgb_round_trip_keeps_channel_order() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, Rgb([200, 100, 50])));
        let mat = dynamic_to_mat(&img).unwrap();
        assert_eq!(mat.channels(), 3);
        assert_eq!(mat_size(&mat), (4, 3));
        let px = mat.at_2d::<core::Vec3b>(1, 2).unwrap();
        assert_eq!(px.0, [50, 100, 200]);

        let back = mat_to_dynamic(&mat).unwrap().to_rgb8();
        assert_eq!(back.get_pixel(2, 1), &Rgb([200, 100, 50]));
    }

    #[test]
    fn alpha_survives_conversion() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 0])));
        let mat = dynamic_to_mat(&img).unwrap();
        assert_eq!(mat.channels(), 4);
        let back = mat_to_dynamic(&mat).unwrap();
        assert!(back.color().has_alpha());
        assert_eq!(back.to_rgba8().get_pixel(0, 0), &Rgba([1, 2, 3, 0]));
    }

    #[test]
    fn alpha_formats() {
        assert!(format_supports_alpha(&PathBuf::from("out.png")));
        assert!(format_supports_alpha(&PathBuf::from("out.webp")));
        assert!(!format_supports_alpha(&PathBuf::from("out.jpg")));
        assert!(!format_supports_alpha(&PathBuf::from("out")));
    }

    #[test]
    fn bgra_to_bgr_and_gray() {
        let mat = Mat::new_rows_cols_with_default(5, 5, core::CV_8UC4, Scalar::all(128.0)).unwrap();
        assert_eq!(ensure_bgr(&mat).unwrap().channels(), 3);
        assert_eq!(to_gray(&mat).unwrap().channels(), 1);
        let two = Mat::new_rows_cols_with_default(5, 5, core::CV_8UC2, Scalar::all(0.0)).unwrap();
        assert!(ensure_bgr(&two).is_err());
    }
}
