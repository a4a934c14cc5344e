use crate::detection::Backend;
use crate::error::{AlignError, Result};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detectors: DetectorConfig,
    pub alignment: AlignmentConfig,
    pub consistency: ConsistencyConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub yunet: YunetConfig,
    pub lbf: LbfConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YunetConfig {
    /// ONNX model, e.g. `face_detection_yunet_2023mar.onnx`.
    pub model_path: PathBuf,
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub top_k: i32,
    /// Shorter side of the face box in pixels.
    pub min_face_size: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LbfConfig {
    pub cascade_path: PathBuf,
    pub model_path: PathBuf,
    pub scale_factor: f64,
    /// Also the minimum confidence, since the cascade reports neighbour counts.
    pub min_neighbors: i32,
    pub min_face_size: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    pub preferred_backend: Backend,
    /// BGRA output with alpha 0 outside the warped image.
    pub transparent_fill: bool,
    /// RGB fill used when transparency is off or the output format has no alpha.
    pub background_color: [u8; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyConfig {
    /// Per-axis tolerance between backends, in pixels.
    pub max_axis_delta_px: f64,
}

impl Default for YunetConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/face_detection_yunet_2023mar.onnx"),
            score_threshold: 0.6,
            nms_threshold: 0.3,
            top_k: 5000,
            min_face_size: 24.0,
        }
    }
}

impl Default for LbfConfig {
    fn default() -> Self {
        Self {
            cascade_path: PathBuf::from("models/haarcascade_frontalface_alt2.xml"),
            model_path: PathBuf::from("models/lbfmodel.yaml"),
            scale_factor: 1.1,
            min_neighbors: 3,
            min_face_size: 40,
        }
    }
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            preferred_backend: Backend::Yunet,
            transparent_fill: true,
            background_color: [0, 0, 0],
        }
    }
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            max_axis_delta_px: 5.0,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        let parsed = if content.trim_start().starts_with('{') {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            toml::from_str(&content).map_err(|e| e.to_string())
        };
        parsed.map_err(|e| AlignError::Config(format!("{}: {e}", path.display())))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, format: ConfigFormat) -> Result<()> {
        let content = match format {
            ConfigFormat::Json => {
                serde_json::to_string_pretty(self).map_err(|e| AlignError::Config(e.to_string()))?
            }
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| AlignError::Config(e.to_string()))?
            }
        };

        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let yunet = &self.detectors.yunet;
        let lbf = &self.detectors.lbf;

        if !(0.0..=1.0).contains(&yunet.score_threshold) {
            errors.push("YuNet score_threshold must be within [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&yunet.nms_threshold) {
            errors.push("YuNet nms_threshold must be within [0, 1]".to_string());
        }
        if yunet.top_k <= 0 {
            errors.push("YuNet top_k must be positive".to_string());
        }
        if !(yunet.min_face_size >= 0.0) {
            errors.push("YuNet min_face_size must be non-negative".to_string());
        }

        if !(lbf.scale_factor > 1.0) {
            errors.push("LBF scale_factor must be greater than 1.0".to_string());
        }
        if lbf.min_neighbors < 0 {
            errors.push("LBF min_neighbors must be non-negative".to_string());
        }
        if lbf.min_face_size < 0 {
            errors.push("LBF min_face_size must be non-negative".to_string());
        }

        if !(self.consistency.max_axis_delta_px > 0.0) {
            errors.push("Consistency max_axis_delta_px must be positive".to_string());
        }

        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// `.json` means JSON, anything else TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

/// Load `config_path`, or the defaults when no path is given.
///
/// Runs before logging is initialised, so problems go to stderr.
pub fn load_config_or_default(config_path: Option<&Path>) -> Config {
    match config_path {
        Some(path) => match Config::load_from_file(path) {
            Ok(config) => {
                if let Err(errors) = config.validate() {
                    eprintln!("Configuration validation errors:");
                    for error in errors {
                        eprintln!("  - {}", error);
                    }
                    eprintln!("Using default configuration instead.");
                    Config::default()
                } else {
                    config
                }
            }
            Err(e) => {
                eprintln!("Failed to load config from '{}': {}", path.display(), e);
                eprintln!("Using default configuration.");
                Config::default()
            }
        },
        None => Config::default(),
    }
}
