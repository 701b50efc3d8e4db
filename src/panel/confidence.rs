use std::fmt;

/// Qualitative wording shown next to a confidence value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLabel {
    High,
    Good,
    Moderate,
    Low,
    VeryLow,
}

impl ConfidenceLabel {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence > 0.8 {
            ConfidenceLabel::High
        } else if confidence > 0.6 {
            ConfidenceLabel::Good
        } else if confidence > 0.4 {
            ConfidenceLabel::Moderate
        } else if confidence > 0.2 {
            ConfidenceLabel::Low
        } else {
            ConfidenceLabel::VeryLow
        }
    }
}

impl fmt::Display for ConfidenceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConfidenceLabel::High => "High",
            ConfidenceLabel::Good => "Good",
            ConfidenceLabel::Moderate => "Moderate",
            ConfidenceLabel::Low => "Low",
            ConfidenceLabel::VeryLow => "Very Low",
        };
        f.write_str(text)
    }
}

/// Colour intensity of a confidence bar. Uses its own thresholds (0.75 / 0.5), which
/// deliberately differ from the label buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceClass {
    High,
    Medium,
    Low,
}

impl ConfidenceClass {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence > 0.75 {
            ConfidenceClass::High
        } else if confidence > 0.5 {
            ConfidenceClass::Medium
        } else {
            ConfidenceClass::Low
        }
    }
}
