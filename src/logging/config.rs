//! Logging configuration: levels per component and output destinations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    pub global_level: String,

    /// Enable console output
    pub console_output: bool,

    /// Directory for daily rolling JSON log files (None = no file logging)
    pub log_directory: Option<PathBuf>,

    /// Include file location in logs
    pub include_file_location: bool,

    /// Landmark backends and the coordinator
    pub detection_level: String,

    /// Similarity solver and warper
    pub transform_level: String,

    pub pipeline_level: String,

    pub consistency_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global_level: "info".to_string(),
            console_output: true,
            log_directory: None,
            include_file_location: false,
            detection_level: "info".to_string(),
            transform_level: "info".to_string(),
            pipeline_level: "info".to_string(),
            consistency_level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Verbose console logging plus JSON files under `logs/`
    pub fn development() -> Self {
        Self {
            global_level: "debug".to_string(),
            console_output: true,
            log_directory: Some(PathBuf::from("logs")),
            include_file_location: true,
            detection_level: "trace".to_string(),
            transform_level: "trace".to_string(),
            pipeline_level: "debug".to_string(),
            consistency_level: "debug".to_string(),
        }
    }

    /// File-only logging at warn
    pub fn production() -> Self {
        Self {
            global_level: "warn".to_string(),
            console_output: false,
            log_directory: Some(PathBuf::from("/var/log/face-align")),
            include_file_location: false,
            detection_level: "warn".to_string(),
            transform_level: "warn".to_string(),
            pipeline_level: "info".to_string(),
            consistency_level: "info".to_string(),
        }
    }

    /// Same config with every level raised to at least `level`.
    pub fn with_min_level(mut self, level: &str) -> Self {
        let rank = |l: &str| VALID_LEVELS.iter().position(|v| *v == l).unwrap_or(2);
        let target = rank(level);
        for field in [
            &mut self.global_level,
            &mut self.detection_level,
            &mut self.transform_level,
            &mut self.pipeline_level,
            &mut self.consistency_level,
        ] {
            if rank(field.as_str()) > target {
                *field = VALID_LEVELS[target].to_string();
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, level) in [
            ("global_level", &self.global_level),
            ("detection_level", &self.detection_level),
            ("transform_level", &self.transform_level),
            ("pipeline_level", &self.pipeline_level),
            ("consistency_level", &self.consistency_level),
        ] {
            if !VALID_LEVELS.contains(&level.as_str()) {
                return Err(format!(
                    "Invalid {}: {}. Must be one of: {:?}",
                    name, level, VALID_LEVELS
                ));
            }
        }

        if let Some(ref log_dir) = self.log_directory {
            if let Some(parent) = log_dir.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(format!("Log directory parent does not exist: {:?}", parent));
                }
            }
        }

        Ok(())
    }

    pub fn get_component_level(&self, component: &str) -> &str {
        match component {
            "detection" => &self.detection_level,
            "transform" => &self.transform_level,
            "pipeline" => &self.pipeline_level,
            "consistency" => &self.consistency_level,
            _ => &self.global_level,
        }
    }

    /// `EnvFilter` directives: the global level for the crate, then one per component module.
    pub fn filter_directives(&self) -> String {
        let krate = env!("CARGO_PKG_NAME").replace('-', "_");
        let mut directives = vec![format!("{}={}", krate, self.global_level)];
        for component in ["detection", "transform", "pipeline", "consistency"] {
            directives.push(format!(
                "{}::{}={}",
                krate,
                component,
                self.get_component_level(component)
            ));
        }
        directives.join(",")
    }
}
