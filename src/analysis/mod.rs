pub mod provider;
pub mod simulated;
pub mod types;

pub use provider::{AnalysisProvider, AnalysisService, TimedAnalysis};
pub use simulated::SimulatedAnalyzer;
pub use types::{AnalysisResult, FaceBox, FramePayload, Gender};
