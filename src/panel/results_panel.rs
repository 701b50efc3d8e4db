use std::time::{Duration, Instant};

use crate::analysis::AnalysisResult;
use crate::capture::{CameraState, CaptureEvent};
use crate::config::PanelSettings;
use crate::panel::animation::AnimatedValue;
use crate::panel::confidence::{ConfidenceClass, ConfidenceLabel};

/// One confidence row: the label comes from the received value, the bar from the
/// animated one.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceRow {
    pub label: ConfidenceLabel,
    pub fraction: f64,
    pub class: ConfidenceClass,
    pub percent: u32,
}

impl ConfidenceRow {
    fn new(received: f64, animated: f64) -> Self {
        Self {
            label: ConfidenceLabel::from_confidence(received),
            fraction: animated.clamp(0.0, 1.0),
            class: ConfidenceClass::from_confidence(animated),
            percent: (animated * 100.0).round().max(0.0) as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultSummary {
    pub gender: String,
    pub gender_confidence: ConfidenceRow,
    pub age_years: u32,
    pub age_confidence: ConfidenceRow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelContent {
    NoFace,
    /// Nothing to show yet, but an analysis is running.
    Pending,
    Results(ResultSummary),
}

/// Display state for the analysis results next to the camera view.
pub struct ResultsPanel {
    result: Option<AnalysisResult>,
    analyzing: bool,
    age: AnimatedValue,
    gender_confidence: AnimatedValue,
    age_confidence: AnimatedValue,
}

impl ResultsPanel {
    pub fn new(settings: &PanelSettings) -> Self {
        let animated = || AnimatedValue::new(settings.animation_steps, settings.step_interval());
        Self {
            result: None,
            analyzing: false,
            age: animated(),
            gender_confidence: animated(),
            age_confidence: animated(),
        }
    }

    pub fn apply(&mut self, event: &CaptureEvent, now: Instant) {
        match event {
            CaptureEvent::AnalysisResult(result) => self.show_result(result.clone(), now),
            CaptureEvent::AnalyzingChanged(analyzing) => self.analyzing = *analyzing,
            CaptureEvent::CameraStateChanged(CameraState::Stopped)
            | CaptureEvent::CameraStateChanged(CameraState::Unavailable { .. }) => {
                self.analyzing = false;
            }
            _ => {}
        }
    }

    pub fn show_result(&mut self, result: AnalysisResult, now: Instant) {
        self.age.animate_to(result.age, now);
        self.gender_confidence
            .animate_to(result.gender_confidence, now);
        self.age_confidence.animate_to(result.age_confidence, now);
        self.result = Some(result);
    }

    /// Applies due animation steps. Returns whether anything visible changed.
    pub fn advance(&mut self, now: Instant) -> bool {
        let age = self.age.advance(now);
        let gender = self.gender_confidence.advance(now);
        let age_confidence = self.age_confidence.advance(now);
        age || gender || age_confidence
    }

    /// How soon the panel wants to be redrawn, if it is animating.
    pub fn next_repaint_in(&self, now: Instant) -> Option<Duration> {
        [&self.age, &self.gender_confidence, &self.age_confidence]
            .into_iter()
            .filter_map(|value| value.next_step_in(now))
            .min()
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn content(&self) -> PanelContent {
        match &self.result {
            Some(result) if result.has_face() => PanelContent::Results(ResultSummary {
                gender: result
                    .gender
                    .map(|g| g.to_string().to_uppercase())
                    .unwrap_or_default(),
                gender_confidence: ConfidenceRow::new(
                    result.gender_confidence,
                    self.gender_confidence.value(),
                ),
                age_years: self.age.value().round().max(0.0) as u32,
                age_confidence: ConfidenceRow::new(
                    result.age_confidence,
                    self.age_confidence.value(),
                ),
            }),
            _ if self.analyzing => PanelContent::Pending,
            _ => PanelContent::NoFace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{FaceBox, Gender};

    fn settings() -> PanelSettings {
        PanelSettings::default()
    }

    fn result() -> AnalysisResult {
        AnalysisResult::single_face(
            FaceBox::new(100.0, 50.0, 200.0, 200.0),
            Gender::Female,
            0.85,
            40.0,
            0.65,
        )
    }

    #[test]
    fn empty_panel_shows_placeholder() {
        let panel = ResultsPanel::new(&settings());
        assert_eq!(panel.content(), PanelContent::NoFace);
        assert!(!panel.is_analyzing());
    }

    #[test]
    fn analyzing_without_result_is_pending() {
        let mut panel = ResultsPanel::new(&settings());
        panel.apply(&CaptureEvent::AnalyzingChanged(true), Instant::now());
        assert_eq!(panel.content(), PanelContent::Pending);
        panel.apply(&CaptureEvent::CameraStateChanged(CameraState::Stopped), Instant::now());
        assert!(!panel.is_analyzing());
    }

    #[test]
    fn results_animate_toward_received_values() {
        let start = Instant::now();
        let mut panel = ResultsPanel::new(&settings());
        panel.apply(&CaptureEvent::AnalysisResult(result()), start);

        let PanelContent::Results(summary) = panel.content() else {
            panic!("expected results");
        };
        assert_eq!(summary.gender, "FEMALE");
        assert_eq!(summary.age_years, 0);
        assert_eq!(summary.gender_confidence.label, ConfidenceLabel::High);
        assert_eq!(summary.age_confidence.label, ConfidenceLabel::Good);
        assert_eq!(summary.gender_confidence.percent, 0);
        assert_eq!(panel.next_repaint_in(start), Some(Duration::from_millis(50)));

        assert!(panel.advance(start + Duration::from_millis(250)));
        let PanelContent::Results(summary) = panel.content() else {
            panic!("expected results");
        };
        assert_eq!(summary.age_years, 20);

        panel.advance(start + Duration::from_secs(1));
        let PanelContent::Results(summary) = panel.content() else {
            panic!("expected results");
        };
        assert_eq!(summary.age_years, 40);
        assert_eq!(summary.gender_confidence.percent, 85);
        assert_eq!(summary.gender_confidence.class, ConfidenceClass::High);
        assert_eq!(summary.age_confidence.percent, 65);
        assert_eq!(summary.age_confidence.class, ConfidenceClass::Medium);
        assert_eq!(panel.next_repaint_in(start + Duration::from_secs(1)), None);
    }

    #[test]
    fn no_face_result_shows_placeholder_and_animates_down() {
        let start = Instant::now();
        let mut panel = ResultsPanel::new(&settings());
        panel.apply(&CaptureEvent::AnalysisResult(result()), start);
        panel.advance(start + Duration::from_secs(1));

        let later = start + Duration::from_secs(2);
        panel.apply(&CaptureEvent::AnalysisResult(AnalysisResult::no_face()), later);
        assert_eq!(panel.content(), PanelContent::NoFace);
        panel.advance(later + Duration::from_secs(1));
        assert_eq!(panel.age.value(), 0.0);
    }
}
