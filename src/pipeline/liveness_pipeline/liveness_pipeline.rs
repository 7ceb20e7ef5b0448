use std::time::Instant;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use crate::config::settings::Detector;
use crate::pipeline::model_config::config::FaceLivenessConfig;
use crate::pipeline::module::face_liveness::{DetectorError, FaceLiveness};
use crate::pipeline::module::label_decision::{decide, Label};
use crate::pipeline::utils::image::decode_rgb_image;

pub const MOCK_MODEL_NAME: &str = "mock";
pub const MOCK_ATTACK_TYPE: &str = "mock";
pub const MOCK_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct LivenessPipeline {
    face_liveness: Option<FaceLiveness>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LivenessResult {
    pub prediction: Label,
    pub confidence: f32,
    pub attack_type: String,
    pub prob_real: Option<f32>,
    pub processing_time_ms: u64,
    pub model_name: String,
}

impl LivenessPipeline {
    /// Loads the configured detector. Without a usable model the pipeline falls back to
    /// mock mode unless `require_model` is set.
    pub fn new(settings: &Detector) -> Result<Self, DetectorError> {
        let face_liveness_config = FaceLivenessConfig::from_settings(settings);

        match FaceLiveness::load(face_liveness_config) {
            Ok(face_liveness) => {
                info!("liveness model {} loaded", face_liveness.model_name());
                Ok(LivenessPipeline::with_detector(face_liveness))
            }
            Err(e) if settings.require_model => Err(e),
            Err(DetectorError::ModelNotFound(path)) => {
                warn!("model {path} not found, running in mock mode");
                Ok(LivenessPipeline::mock())
            }
            Err(e) => {
                error!("model found but failed to load, running in mock mode: {e}");
                Ok(LivenessPipeline::mock())
            }
        }
    }

    pub fn with_detector(face_liveness: FaceLiveness) -> Self {
        LivenessPipeline {
            face_liveness: Some(face_liveness),
        }
    }

    pub fn mock() -> Self {
        LivenessPipeline { face_liveness: None }
    }

    pub fn model_loaded(&self) -> bool {
        self.face_liveness.is_some()
    }

    pub fn model_name(&self) -> &str {
        match &self.face_liveness {
            Some(face_liveness) => face_liveness.model_name(),
            None => MOCK_MODEL_NAME,
        }
    }

    /// Decodes the image, runs the detector and settles the final label.
    pub fn extract(&self, im_bytes: &[u8]) -> Result<LivenessResult, DetectorError> {
        let start = Instant::now();
        let img = decode_rgb_image(im_bytes).map_err(|e| DetectorError::Decode(format!("{e:#}")))?;

        let face_liveness = match &self.face_liveness {
            Some(face_liveness) => face_liveness,
            None => {
                return Ok(LivenessResult {
                    prediction: Label::Fake,
                    confidence: MOCK_CONFIDENCE,
                    attack_type: MOCK_ATTACK_TYPE.to_string(),
                    prob_real: None,
                    processing_time_ms: start.elapsed().as_millis() as u64,
                    model_name: MOCK_MODEL_NAME.to_string(),
                })
            }
        };

        let prediction = face_liveness.predict(&img)?;
        let prob_real = prediction.prob_real;
        let decision = decide(prob_real, 1.0 - prob_real);

        Ok(LivenessResult {
            prediction: decision.label,
            confidence: decision.confidence,
            attack_type: prediction.attack_type,
            prob_real: Some(prob_real),
            processing_time_ms: start.elapsed().as_millis() as u64,
            model_name: face_liveness.model_name().to_string(),
        })
    }
}
