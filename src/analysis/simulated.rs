use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::analysis::{AnalysisProvider, AnalysisResult, FaceBox, FramePayload, Gender};
use crate::config::AnalysisSettings;
use crate::error::AnalysisError;

/// Stand-in analyzer: sleeps for a fixed latency, then draws a pseudo-random result.
/// No image data is inspected.
pub struct SimulatedAnalyzer {
    latency: Duration,
    detection_probability: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedAnalyzer {
    pub fn new(latency: Duration, detection_probability: f64) -> Self {
        Self {
            latency,
            detection_probability: detection_probability.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn from_settings(settings: &AnalysisSettings) -> Self {
        let analyzer = Self::new(settings.latency(), settings.detection_probability);
        match settings.seed {
            Some(seed) => analyzer.with_seed(seed),
            None => analyzer,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    fn draw(&self) -> AnalysisResult {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        if !rng.random_bool(self.detection_probability) {
            return AnalysisResult::no_face();
        }

        let face_box = FaceBox::new(
            rng.random_range(100.0..150.0),
            rng.random_range(50.0..100.0),
            rng.random_range(200.0..250.0),
            rng.random_range(200.0..250.0),
        );

        // Confidence grows with the distance of the coin from the midpoint.
        let coin: f64 = rng.random();
        let gender = if coin > 0.5 { Gender::Male } else { Gender::Female };
        let gender_confidence = 0.7 + (coin - 0.5).abs() * 0.6;

        let age = 18.0 + rng.random::<f64>() * 60.0;
        let age_confidence = 0.5 + rng.random::<f64>() * 0.45;

        AnalysisResult::single_face(face_box, gender, gender_confidence, age, age_confidence)
    }
}

impl Default for SimulatedAnalyzer {
    fn default() -> Self {
        Self::from_settings(&AnalysisSettings::default())
    }
}

#[async_trait]
impl AnalysisProvider for SimulatedAnalyzer {
    async fn analyze(&self, frame: &FramePayload) -> Result<AnalysisResult, AnalysisError> {
        tokio::time::sleep(self.latency).await;
        let result = self.draw();
        debug!(
            "Simulated analysis of frame {} ({}x{}, captured {} ms ago): {} face(s)",
            frame.id,
            frame.width,
            frame.height,
            frame.age_at(Utc::now()).num_milliseconds(),
            result.faces_detected
        );
        Ok(result)
    }
}
