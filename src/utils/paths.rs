use crate::error::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Extensions picked up when a directory of generated images is aligned.
pub const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "webp", "tif", "tiff", "bmp"];

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted by path.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_image_extension(p))
        .collect();
    images.sort();
    Ok(images)
}

/// One PNG output path per input, all distinct.
///
/// Names are `{stem}_{ext}_aligned.png` so `face.jpg` and `face.png` do not
/// collide. Anything that still clashes (extensions differing only in case)
/// gets a `_{n}` suffix in input order.
pub fn batch_output_paths(images: &[PathBuf], output_dir: &Path) -> Vec<PathBuf> {
    let mut taken = HashSet::new();
    images
        .iter()
        .map(|image| {
            let stem = image
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string());
            let base = match image.extension() {
                Some(ext) => format!("{}_{}", stem, ext.to_string_lossy().to_ascii_lowercase()),
                None => stem,
            };

            let mut name = format!("{base}_aligned.png");
            let mut n = 2;
            while !taken.insert(name.clone()) {
                name = format!("{base}_aligned_{n}.png");
                n += 1;
            }
            output_dir.join(name)
        })
        .collect()
}
