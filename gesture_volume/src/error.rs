//! Error types for the capture → inference → mixer pipeline.

use thiserror::Error;

/// Top-level error returned by [`crate::app::run`].
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Landmark error: {0}")]
    Landmark(#[from] LandmarkError),

    #[error("Preview error: {0}")]
    Preview(#[from] PreviewError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Webcam errors.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to open camera #{index}")]
    Open { index: i32 },

    #[error("Failed to read frame: {0}")]
    Read(String),
}

/// Hand landmark model errors.
#[derive(Error, Debug)]
pub enum LandmarkError {
    #[error("Failed to load model {path}: {reason}")]
    ModelLoad { path: String, reason: String },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unexpected model output: {0}")]
    UnexpectedOutput(String),
}

/// OS mixer errors.
#[derive(Error, Debug)]
pub enum MixerError {
    #[error("Mixer unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to set level: {0}")]
    SetLevel(String),
}

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("Failed to open window: {0}")]
    Window(String),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}
