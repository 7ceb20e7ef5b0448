use bytes::Bytes;
use serde::{Deserialize, Serialize};
use crate::pipeline::module::label_decision::Label;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DetectionResultOutput {
    pub prediction: Label,
    pub confidence: f64,
    pub attack_type: String,
    pub processing_time_ms: u64,
    pub model_loaded: bool,
}

#[derive(Clone)]
pub struct DetectionInput {
    pub im_bytes: Bytes,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthOutput {
    pub status: String,
    pub model_loaded: bool,
}

/// Rounds a confidence to 4 decimals for the API response.
pub fn round_confidence(confidence: f32) -> f64 {
    (confidence as f64 * 10_000.0).round() / 10_000.0
}
