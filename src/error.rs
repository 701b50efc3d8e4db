use std::time::Duration;

use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
    #[error("Media Error: {0}")]
    Media(#[from] MediaError),
    #[error("Analysis Error: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("Capture Error: {0}")]
    Capture(#[from] CaptureError),
    #[error("UI Error: {0}")]
    Ui(String),
    #[error("Pipeline Error: {0}")]
    Pipeline(String),
    #[error("Output Error: {0}")]
    Output(#[from] std::io::Error),
    #[error("Serialization Error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Video input error type. `AccessDenied` is what the UI turns into the permission prompt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Camera access was denied")]
    AccessDenied,
    #[error("No camera matches the requested constraints: {0}")]
    NotFound(String),
    #[error("The video stream ended unexpectedly")]
    StreamEnded,
    #[error("The video stream has been stopped")]
    Stopped,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Analysis provider unavailable: {0}")]
    Unavailable(String),
    #[error("Analysis timed out after {0:?}")]
    Timeout(Duration),
    #[error("Malformed analysis data: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to read frame: {0}")]
    Media(#[from] MediaError),
    #[error("Failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Frame has zero size ({0}x{1})")]
    EmptyFrame(u32, u32),
}
