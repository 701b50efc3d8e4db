pub mod analysis;
pub mod app;
pub mod capture;
pub mod config;
pub mod error;
pub mod headless;
pub mod media;
pub mod panel;

pub use error::{AnalysisError, AppError, CaptureError, MediaError};

pub use analysis::{AnalysisProvider, AnalysisResult, SimulatedAnalyzer};
pub use capture::{CaptureEvent, CaptureLoop};
pub use config::Settings;
pub use panel::ResultsPanel;
