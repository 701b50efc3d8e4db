pub mod animation;
pub mod confidence;
pub mod results_panel;

pub use animation::{AnimatedValue, Tween};
pub use confidence::{ConfidenceClass, ConfidenceLabel};
pub use results_panel::{ConfidenceRow, PanelContent, ResultSummary, ResultsPanel};
