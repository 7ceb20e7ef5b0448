use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use anyhow::{anyhow, Context};
use image::DynamicImage;
use log::{debug, info, warn};
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use serde::Serialize;
use crate::pipeline::model_config::config::{FaceLivenessClass, FaceLivenessConfig, LabelMap, match_face_liveness};
use crate::pipeline::module::label_decision::{clamp_probability, normalize_label, Label};
use crate::pipeline::utils::image::{blank_tensor, preprocess};

pub const DEFAULT_ATTACK_TYPE: &str = "unknown";

#[derive(thiserror::Error, Debug)]
pub enum DetectorError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("failed to load model from {path}: {}", .attempts.join("; "))]
    LoadFailed { path: String, attempts: Vec<String> },

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("unexpected model output: {0}")]
    OutputShape(String),
}

/// Ways of bringing a model file into an ONNX Runtime session, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    Optimized,
    Unoptimized,
    InMemory,
}

pub const LOAD_STRATEGIES: [LoadStrategy; 3] = [
    LoadStrategy::Optimized,
    LoadStrategy::Unoptimized,
    LoadStrategy::InMemory,
];

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadStrategy::Optimized => "optimized",
            LoadStrategy::Unoptimized => "unoptimized",
            LoadStrategy::InMemory => "in-memory",
        };
        f.write_str(name)
    }
}

/// Runs `attempt` for each strategy until one succeeds. Fails only when all of them fail.
pub fn load_with_fallback<T, F>(path: &str, strategies: &[LoadStrategy], mut attempt: F) -> Result<(T, LoadStrategy), DetectorError>
where
    F: FnMut(LoadStrategy) -> anyhow::Result<T>,
{
    let mut attempts = Vec::with_capacity(strategies.len());
    for &strategy in strategies {
        match attempt(strategy) {
            Ok(loaded) => {
                if !attempts.is_empty() {
                    info!("model {path} loaded with {strategy} strategy after {} failed attempt(s)", attempts.len());
                }
                return Ok((loaded, strategy));
            }
            Err(e) => {
                warn!("{strategy} load of {path} failed: {e:#}");
                attempts.push(format!("{strategy}: {e:#}"));
            }
        }
    }
    Err(DetectorError::LoadFailed { path: path.to_string(), attempts })
}

/// Raw classifier output for a single image.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

pub trait LivenessModel: Send + Sync {
    fn infer(&self, input: Array4<f32>) -> anyhow::Result<ModelOutput>;
}

pub struct OnnxLivenessModel {
    session: Mutex<Session>,
    input_name: String,
}

impl OnnxLivenessModel {
    pub fn load(cfg: &FaceLivenessConfig) -> Result<Self, DetectorError> {
        let path = cfg.model_path.to_string_lossy().to_string();
        if !cfg.model_path.exists() {
            return Err(DetectorError::ModelNotFound(path));
        }

        let (session, _) = load_with_fallback(&path, &LOAD_STRATEGIES, |strategy| {
            build_session(&cfg.model_path, strategy, cfg.intra_threads)
        })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "input_1".to_string());
        debug!("liveness model input: {input_name}");

        Ok(OnnxLivenessModel {
            session: Mutex::new(session),
            input_name,
        })
    }
}

fn build_session(model_path: &Path, strategy: LoadStrategy, intra_threads: usize) -> anyhow::Result<Session> {
    let level = match strategy {
        LoadStrategy::Optimized => GraphOptimizationLevel::Level3,
        LoadStrategy::Unoptimized | LoadStrategy::InMemory => GraphOptimizationLevel::Disable,
    };

    let builder = Session::builder()
        .context("failed to create session builder")?
        .with_optimization_level(level)
        .context("failed to set optimization level")?
        .with_intra_threads(intra_threads)
        .context("failed to set intra threads")?;

    match strategy {
        LoadStrategy::InMemory => {
            let bytes = fs::read(model_path)
                .with_context(|| format!("failed to read {}", model_path.display()))?;
            builder
                .commit_from_memory(&bytes)
                .context("failed to load model from memory")
        }
        _ => builder
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load model from {}", model_path.display())),
    }
}

impl LivenessModel for OnnxLivenessModel {
    fn infer(&self, input: Array4<f32>) -> anyhow::Result<ModelOutput> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("liveness session lock poisoned"))?;

        let input_value = Value::from_array(input).context("failed to create input tensor")?;
        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("liveness inference failed")?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .context("failed to extract output tensor")?;

        Ok(ModelOutput {
            shape: output_tensor.shape().to_vec(),
            values: output_tensor.iter().copied().collect(),
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LivenessPrediction {
    pub label: Label,
    pub class: FaceLivenessClass,
    pub confidence: f32,
    pub prob_real: f32,
    pub prob_fake: f32,
    pub attack_type: String,
}

/// Index of the "real" class in a two-class output.
pub fn real_index(label_map: Option<&LabelMap>) -> usize {
    label_map
        .and_then(|lm| {
            lm.iter()
                .filter(|(_, name)| normalize_label(name) == Label::Real)
                .map(|(idx, _)| *idx)
                .min()
        })
        .unwrap_or(1)
}

/// Reads the probability of the "real" class out of a sigmoid or softmax head.
pub fn extract_prob_real(output: &ModelOutput, label_map: Option<&LabelMap>) -> Result<f32, DetectorError> {
    if output.values.is_empty() {
        return Err(DetectorError::OutputShape(format!("empty output with shape {:?}", output.shape)));
    }

    let two_class = output.shape.last() == Some(&2) && output.values.len() >= 2;
    let p_real = if two_class {
        let idx = real_index(label_map);
        *output.values.get(idx).ok_or_else(|| {
            DetectorError::OutputShape(format!("real index {idx} outside output of shape {:?}", output.shape))
        })?
    } else {
        output.values[0]
    };

    Ok(clamp_probability(p_real))
}

/// Canonical label of a class index, honoring the label map or, without one, `flip_labels`.
pub fn map_index(idx: usize, label_map: Option<&LabelMap>, flip_labels: bool) -> Label {
    let default_label = Label::from(match_face_liveness(idx));
    if let Some(lm) = label_map {
        return lm.get(&idx).map(|name| normalize_label(name)).unwrap_or(default_label);
    }
    match (flip_labels, default_label) {
        (true, Label::Real) => Label::Fake,
        (true, Label::Fake) => Label::Real,
        (_, label) => label,
    }
}

pub fn classify(prob_real: f32, threshold: f32, label_map: Option<&LabelMap>, flip_labels: bool) -> LivenessPrediction {
    let prob_real = clamp_probability(prob_real);
    let prob_fake = 1.0 - prob_real;

    let (idx, confidence) = if prob_real >= threshold {
        (1, prob_real)
    } else {
        (0, prob_fake)
    };

    LivenessPrediction {
        label: map_index(idx, label_map, flip_labels),
        class: match_face_liveness(idx),
        confidence,
        prob_real,
        prob_fake,
        attack_type: DEFAULT_ATTACK_TYPE.to_string(),
    }
}

#[derive(Clone)]
pub struct FaceLiveness {
    model: Arc<dyn LivenessModel>,
    config: FaceLivenessConfig,
    model_name: String,
}

impl fmt::Debug for FaceLiveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaceLiveness")
            .field("model_name", &self.model_name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FaceLiveness {
    pub fn new(model: Arc<dyn LivenessModel>, config: FaceLivenessConfig) -> Self {
        let model_name = config
            .model_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "model".to_string());

        FaceLiveness {
            model,
            config,
            model_name,
        }
    }

    pub fn load(config: FaceLivenessConfig) -> Result<Self, DetectorError> {
        let model = OnnxLivenessModel::load(&config)?;
        let detector = FaceLiveness::new(Arc::new(model), config);
        detector.warm_up();
        info!(
            "liveness detector initialized: model={} threshold={} flip_labels={} label_map={:?}",
            detector.model_name, detector.config.threshold, detector.config.flip_labels, detector.config.label_map
        );
        Ok(detector)
    }

    /// Runs one inference on a blank input so the first request does not pay for lazy initialisation.
    pub fn warm_up(&self) {
        let dummy = blank_tensor(self.config.image_size, self.config.layout);
        if let Err(e) = self.model.infer(dummy) {
            warn!("liveness warm-up failed: {e:#}");
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn threshold(&self) -> f32 {
        self.config.threshold
    }

    pub fn predict(&self, img: &DynamicImage) -> Result<LivenessPrediction, DetectorError> {
        let tensor = preprocess(img, self.config.image_size, self.config.layout);
        let output = self
            .model
            .infer(tensor)
            .map_err(|e| DetectorError::Inference(format!("{e:#}")))?;

        let label_map = self.config.label_map.as_ref();
        let prob_real = extract_prob_real(&output, label_map)?;
        let prediction = classify(prob_real, self.config.threshold, label_map, self.config.flip_labels);

        debug!(
            "p_real={:.4} threshold={} => {} (conf={:.4})",
            prediction.prob_real, self.config.threshold, prediction.label, prediction.confidence
        );
        Ok(prediction)
    }
}
