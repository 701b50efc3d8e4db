use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::AppError;
use crate::media::FacingMode;

pub const CONFIG_PATH_ENV: &str = "FACELENS_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "facelens";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub capture: CaptureSettings,
    pub analysis: AnalysisSettings,
    pub camera: CameraSettings,
    pub panel: PanelSettings,
    pub ui: UiSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub interval_ms: u64,
    pub analysis_timeout_ms: u64,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing: FacingMode,
    pub jpeg_quality: u8,
    /// Drop completions from ticks that are no longer the latest one issued.
    pub discard_stale_results: bool,
    pub event_buffer: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub latency_ms: u64,
    pub detection_probability: f64,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub max_width: u32,
    pub max_height: u32,
    pub deny_access: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PanelSettings {
    pub animation_steps: u32,
    pub animation_step_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub headless: bool,
    pub window_width: f32,
    pub window_height: f32,
    pub run_for_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            analysis_timeout_ms: 5000,
            ideal_width: 1280,
            ideal_height: 720,
            facing: FacingMode::User,
            jpeg_quality: 92,
            discard_stale_results: true,
            event_buffer: 64,
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            latency_ms: 800,
            detection_probability: 0.7,
            seed: None,
        }
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1080,
            deny_access: false,
        }
    }
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            animation_steps: 10,
            animation_step_ms: 50,
        }
    }
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            headless: false,
            window_width: 1280.0,
            window_height: 720.0,
            run_for_secs: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CaptureSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_millis(self.analysis_timeout_ms)
    }
}

impl AnalysisSettings {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

impl PanelSettings {
    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.animation_step_ms)
    }
}

impl Settings {
    /// Loads `facelens.toml` (or the file named by `FACELENS_CONFIG`) if present, then
    /// applies `FACELENS__SECTION__KEY` environment overrides.
    pub fn load() -> Result<Self, AppError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let settings: Settings = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(Environment::with_prefix("FACELENS").prefix_separator("__").separator("__"))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.capture.interval_ms == 0 {
            return Err(AppError::InvalidSetting(
                "capture.interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.capture.analysis_timeout_ms == 0 {
            return Err(AppError::InvalidSetting(
                "capture.analysis_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if !(1..=100).contains(&self.capture.jpeg_quality) {
            return Err(AppError::InvalidSetting(format!(
                "capture.jpeg_quality must be within 1..=100, got {}",
                self.capture.jpeg_quality
            )));
        }
        if self.capture.event_buffer == 0 {
            return Err(AppError::InvalidSetting(
                "capture.event_buffer must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.analysis.detection_probability) {
            return Err(AppError::InvalidSetting(format!(
                "analysis.detection_probability must be within [0, 1], got {}",
                self.analysis.detection_probability
            )));
        }
        if self.panel.animation_steps == 0 {
            return Err(AppError::InvalidSetting(
                "panel.animation_steps must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn log_level(&self) -> tracing::Level {
        self.logging
            .level
            .parse()
            .unwrap_or(tracing::Level::INFO)
    }
}
