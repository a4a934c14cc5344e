pub mod image_conversion;
pub mod paths;

pub use image_conversion::{
    dynamic_to_mat, ensure_bgr, format_supports_alpha, load_image, mat_size, mat_to_dynamic,
    save_image, to_gray,
};
pub use paths::{batch_output_paths, collect_images, IMAGE_EXTENSIONS};
