use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AnalysisError;

/// Axis-aligned face bounds in source-frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FaceBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "Male"),
            Gender::Female => write!(f, "Female"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub faces_detected: u32,
    pub gender: Option<Gender>,
    pub gender_confidence: f64,
    pub age: f64,
    pub age_confidence: f64,
    pub face_box: Option<FaceBox>,
}

impl AnalysisResult {
    pub fn no_face() -> Self {
        Self {
            faces_detected: 0,
            gender: None,
            gender_confidence: 0.0,
            age: 0.0,
            age_confidence: 0.0,
            face_box: None,
        }
    }

    pub fn single_face(
        face_box: FaceBox,
        gender: Gender,
        gender_confidence: f64,
        age: f64,
        age_confidence: f64,
    ) -> Self {
        Self {
            faces_detected: 1,
            gender: Some(gender),
            gender_confidence,
            age,
            age_confidence,
            face_box: Some(face_box),
        }
    }

    pub fn has_face(&self) -> bool {
        self.faces_detected > 0
    }

    /// Checks the record invariants: confidences in [0, 1], non-negative age, and an
    /// empty record whenever no face was detected.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        for (name, value) in [
            ("genderConfidence", self.gender_confidence),
            ("ageConfidence", self.age_confidence),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(AnalysisError::Malformed(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if !self.age.is_finite() || self.age < 0.0 {
            return Err(AnalysisError::Malformed(format!(
                "age must be a non-negative number, got {}",
                self.age
            )));
        }
        if self.faces_detected == 0 && *self != Self::no_face() {
            return Err(AnalysisError::Malformed(
                "result reports no faces but carries face data".to_string(),
            ));
        }
        if let Some(face_box) = &self.face_box {
            if face_box.width <= 0.0 || face_box.height <= 0.0 {
                return Err(AnalysisError::Malformed(format!(
                    "face box has a non-positive size {}x{}",
                    face_box.width, face_box.height
                )));
            }
        }
        Ok(())
    }
}

/// An encoded still handed to an analysis provider.
#[derive(Debug, Clone)]
pub struct FramePayload {
    pub id: Uuid,
    pub captured_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub mime: &'static str,
    pub bytes: Bytes,
}

impl FramePayload {
    pub fn new(width: u32, height: u32, mime: &'static str, bytes: Bytes) -> Self {
        Self {
            id: Uuid::new_v4(),
            captured_at: Utc::now(),
            width,
            height,
            mime,
            bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Time since capture, clamped at zero if the wall clock stepped backwards.
    pub fn age_at(&self, now: DateTime<Utc>) -> TimeDelta {
        (now - self.captured_at).max(TimeDelta::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_face_result_is_valid_and_empty() {
        let result = AnalysisResult::no_face();
        assert!(!result.has_face());
        assert!(result.face_box.is_none());
        assert!(result.gender.is_none());
        assert!(result.validate().is_ok());
    }

    #[test]
    fn zero_faces_with_a_box_is_malformed() {
        let mut result = AnalysisResult::no_face();
        result.face_box = Some(FaceBox::new(1.0, 1.0, 10.0, 10.0));
        assert!(matches!(result.validate(), Err(AnalysisError::Malformed(_))));
    }

    #[test]
    fn confidence_above_one_is_malformed() {
        let result = AnalysisResult::single_face(
            FaceBox::new(100.0, 50.0, 200.0, 200.0),
            Gender::Female,
            1.2,
            30.0,
            0.6,
        );
        assert!(matches!(result.validate(), Err(AnalysisError::Malformed(_))));
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let result = AnalysisResult::single_face(
            FaceBox::new(100.0, 50.0, 200.0, 200.0),
            Gender::Male,
            0.9,
            42.0,
            0.8,
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["facesDetected"], 1);
        assert_eq!(json["gender"], "Male");
        assert_eq!(json["faceBox"]["width"], 200.0);
        assert!(json.get("genderConfidence").is_some());
    }

    #[test]
    fn payload_age_is_measured_from_capture() {
        let payload = FramePayload::new(4, 4, "image/jpeg", Bytes::from_static(b"jpeg"));
        let later = payload.captured_at + TimeDelta::milliseconds(800);
        assert_eq!(payload.age_at(later), TimeDelta::milliseconds(800));
        let earlier = payload.captured_at - TimeDelta::seconds(1);
        assert_eq!(payload.age_at(earlier), TimeDelta::zero());
    }
}
