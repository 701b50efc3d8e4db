use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::analysis::AnalysisResult;
use crate::media::FacingMode;

/// Notifications the capture loop publishes to the display layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum CaptureEvent {
    AnalysisResult(AnalysisResult),
    AnalyzingChanged(bool),
    FacesDetected(u32),
    CameraStateChanged(CameraState),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CameraState {
    Initializing,
    Live {
        facing: FacingMode,
        width: u32,
        height: u32,
    },
    Unavailable {
        reason: String,
    },
    Stopped,
}

/// Hands out monotonically increasing tick tokens and keeps the newest token whose
/// result has been applied, so a completion never overwrites a newer one.
#[derive(Debug, Default)]
pub struct TickSequencer {
    latest: AtomicU64,
    applied: AtomicU64,
}

impl TickSequencer {
    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Claims `token` for publishing. Fails when a newer tick was already applied.
    pub fn try_apply(&self, token: u64) -> bool {
        self.applied.fetch_max(token, Ordering::SeqCst) < token
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_increase_monotonically() {
        let sequencer = TickSequencer::default();
        let first = sequencer.issue();
        let second = sequencer.issue();
        assert!(second > first);
        assert_eq!(sequencer.latest(), second);
    }

    #[test]
    fn older_tokens_lose_to_an_applied_newer_one() {
        let sequencer = TickSequencer::default();
        let first = sequencer.issue();
        let second = sequencer.issue();
        let third = sequencer.issue();

        // Completions may land out of order while later ticks are still running.
        assert!(sequencer.try_apply(second));
        assert!(!sequencer.try_apply(first));
        assert!(sequencer.try_apply(third));
        assert!(!sequencer.try_apply(third));
        assert_eq!(sequencer.applied(), third);
    }

    #[test]
    fn events_serialize_as_tagged_json() {
        let json = serde_json::to_value(CaptureEvent::FacesDetected(1)).unwrap();
        assert_eq!(json["event"], "faces_detected");
        assert_eq!(json["data"], 1);

        let json = serde_json::to_value(CaptureEvent::CameraStateChanged(CameraState::Live {
            facing: FacingMode::User,
            width: 1280,
            height: 720,
        }))
        .unwrap();
        assert_eq!(json["data"]["state"], "live");
        assert_eq!(json["data"]["facing"], "user");
    }
}
