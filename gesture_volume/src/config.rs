//! Application configuration.
//!
//! Every field has a default, so the program runs with no config file at all.
//! A TOML file can override any subset:
//!
//! ```toml
//! camera_index     = 1
//! calibration_near = 25.0
//! calibration_far  = 180.0
//! ```

use std::path::{Path, PathBuf};

use pinch_map::Calibration;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "GESTURE_VOLUME_CONFIG";

/// File looked up in the working directory when [`CONFIG_ENV`] is unset.
pub const CONFIG_FILE: &str = "gesture_volume.toml";

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

/// Configuration for the full application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera_index:  i32,
    /// Flip frames horizontally so the preview behaves like a mirror.
    pub mirror:        bool,

    pub palm_model_path:  PathBuf,
    pub palm_input_size:  usize,
    pub model_path:       PathBuf,
    /// Edge length of the square landmark model input, in pixels.
    pub model_input_size: usize,
    /// Palm and hand presence score below which a detection is discarded.
    pub min_detection_confidence: f32,
    pub max_num_hands:    usize,

    /// Pinch distance (px) that maps to the minimum level.
    pub calibration_near: f64,
    /// Pinch distance (px) that maps to the maximum level.
    pub calibration_far:  f64,

    pub window_title:  String,

    /// ALSA card name (Linux backend only).
    pub mixer_card:    String,
    /// ALSA simple mixer element (Linux backend only).
    pub mixer_control: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            camera_index:     0,
            mirror:           true,
            palm_model_path:  PathBuf::from("models/palm_detection.onnx"),
            palm_input_size:  192,
            model_path:       PathBuf::from("models/hand_landmark.onnx"),
            model_input_size: 224,
            min_detection_confidence: 0.7,
            max_num_hands:    2,
            calibration_near: Calibration::DEFAULT_NEAR,
            calibration_far:  Calibration::DEFAULT_FAR,
            window_title:     "Gesture Volume Control".to_string(),
            mixer_card:       "default".to_string(),
            mixer_control:    "Master".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// `$GESTURE_VOLUME_CONFIG`, then `./gesture_volume.toml`, then defaults.
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            let path = PathBuf::from(path);
            log::info!("Loading config from {} (${})", path.display(), CONFIG_ENV);
            return Self::from_file(path);
        }

        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            log::info!("Loading config from {}", local.display());
            return Self::from_file(local);
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let near = self.calibration_near;
        let far  = self.calibration_far;
        if !near.is_finite() || near < 0.0 {
            return Err(invalid("calibration_near", "must be a finite distance >= 0"));
        }
        if !far.is_finite() || far <= near {
            return Err(invalid("calibration_far", "must be finite and greater than calibration_near"));
        }
        if !(0.0..=1.0).contains(&self.min_detection_confidence) {
            return Err(invalid("min_detection_confidence", "must be within 0.0–1.0"));
        }
        if self.model_input_size == 0 {
            return Err(invalid("model_input_size", "must be greater than 0"));
        }
        if self.palm_input_size == 0 {
            return Err(invalid("palm_input_size", "must be greater than 0"));
        }
        if self.max_num_hands == 0 {
            return Err(invalid("max_num_hands", "must be at least 1"));
        }
        Ok(())
    }

    pub fn calibration(&self) -> Calibration {
        Calibration::new(self.calibration_near, self.calibration_far)
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field:   field.to_string(),
        message: message.to_string(),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
