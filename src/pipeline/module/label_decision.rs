use std::fmt;
use serde::{Deserialize, Serialize};
use crate::pipeline::model_config::config::FaceLivenessClass;

const REAL_KEYWORDS: [&str; 4] = ["live", "real", "genuine", "real_face"];
const FAKE_KEYWORDS: [&str; 6] = ["spoof", "fake", "attack", "replay", "print", "mask"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Real,
    Fake,
    Unknown,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Real => "real",
            Label::Fake => "fake",
            Label::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<FaceLivenessClass> for Label {
    fn from(class: FaceLivenessClass) -> Self {
        match class {
            FaceLivenessClass::Real => Label::Real,
            FaceLivenessClass::Fake => Label::Fake,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub label: Label,
    pub confidence: f32,
}

pub fn clamp_probability(p: f32) -> f32 {
    if p.is_nan() {
        return 0.0;
    }
    p.clamp(0.0, 1.0)
}

/// Picks the more likely class. Ties go to `real`.
pub fn decide(prob_real: f32, prob_fake: f32) -> Decision {
    let prob_real = clamp_probability(prob_real);
    let prob_fake = clamp_probability(prob_fake);

    if prob_real >= prob_fake {
        Decision { label: Label::Real, confidence: prob_real }
    } else {
        Decision { label: Label::Fake, confidence: prob_fake }
    }
}

/// Maps a free-form label (`"live"`, `"Spoof"`, ...) onto the canonical set.
pub fn normalize_label(raw: &str) -> Label {
    let p = raw.trim().to_lowercase();
    if REAL_KEYWORDS.contains(&p.as_str()) {
        return Label::Real;
    }
    if FAKE_KEYWORDS.contains(&p.as_str()) {
        return Label::Fake;
    }
    Label::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tie_favors_real() {
        let decision = decide(0.5, 0.5);
        assert_eq!(decision.label, Label::Real);
        assert_eq!(decision.confidence, 0.5);
    }

    #[test]
    fn test_complementary_probabilities() {
        for i in 0..=1000 {
            let prob_real = i as f32 / 1000.0;
            let decision = decide(prob_real, 1.0 - prob_real);

            assert_eq!(decision.label == Label::Real, prob_real >= 0.5, "prob_real={prob_real}");
            assert!((0.0..=1.0).contains(&decision.confidence));
            assert!(decision.confidence >= 0.5);
        }
    }

    #[test]
    fn test_inputs_are_clamped() {
        let decision = decide(1.7, -0.3);
        assert_eq!(decision.label, Label::Real);
        assert_eq!(decision.confidence, 1.0);

        let decision = decide(-2.0, 3.0);
        assert_eq!(decision.label, Label::Fake);
        assert_eq!(decision.confidence, 1.0);

        let decision = decide(f32::NAN, 0.2);
        assert_eq!(decision.label, Label::Fake);
        assert_eq!(decision.confidence, 0.2);
    }

    #[test]
    fn test_normalize_label() {
        for raw in ["live", "Real", " genuine ", "REAL_FACE"] {
            assert_eq!(normalize_label(raw), Label::Real, "{raw}");
        }
        for raw in ["spoof", "Fake", "attack", "replay", "print", "MASK"] {
            assert_eq!(normalize_label(raw), Label::Fake, "{raw}");
        }
        for raw in ["", "   ", "face", "unknown", "real face"] {
            assert_eq!(normalize_label(raw), Label::Unknown, "{raw}");
        }
    }

    #[test]
    fn test_normalize_label_idempotent() {
        for label in [Label::Real, Label::Fake, Label::Unknown] {
            assert_eq!(normalize_label(label.as_str()), label);
            assert_eq!(normalize_label(normalize_label(label.as_str()).as_str()), label);
        }
    }

    #[test]
    fn test_label_serialization() {
        assert_eq!(serde_json::to_string(&Label::Real).unwrap(), "\"real\"");
        assert_eq!(serde_json::from_str::<Label>("\"unknown\"").unwrap(), Label::Unknown);
        assert_eq!(Label::from(FaceLivenessClass::Fake), Label::Fake);
    }
}
