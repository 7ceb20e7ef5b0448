use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use log::warn;
use serde::{Deserialize, Serialize};
use crate::config::settings::Detector;

pub const DEFAULT_THRESHOLD: f32 = 0.5;
pub const DEFAULT_INPUT_SIZE: u32 = 224;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FaceLivenessClass {
    Fake = 0,
    Real = 1,
}

pub fn match_face_liveness(q: usize) -> FaceLivenessClass {
    match q {
        0 => FaceLivenessClass::Fake,
        _ => FaceLivenessClass::Real,
    }
}

/// Memory layout of the model input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[1, H, W, 3]`, as exported from Keras.
    Nhwc,
    /// `[1, 3, H, W]`, as exported from PyTorch.
    Nchw,
}

impl TensorLayout {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "nhwc" => Some(TensorLayout::Nhwc),
            "nchw" => Some(TensorLayout::Nchw),
            _ => None,
        }
    }
}

/// Class index -> raw label name, e.g. `{0: "fake", 1: "real"}`.
pub type LabelMap = HashMap<usize, String>;

#[derive(Debug, Clone)]
pub struct FaceLivenessConfig {
    pub model_path: PathBuf,
    pub image_size: (u32, u32),
    pub layout: TensorLayout,
    pub threshold: f32,
    pub flip_labels: bool,
    pub label_map: Option<LabelMap>,
    pub intra_threads: usize,
}

impl FaceLivenessConfig {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        FaceLivenessConfig {
            model_path: model_path.into(),
            image_size: (DEFAULT_INPUT_SIZE, DEFAULT_INPUT_SIZE),
            layout: TensorLayout::Nhwc,
            threshold: DEFAULT_THRESHOLD,
            flip_labels: false,
            label_map: None,
            intra_threads: 4,
        }
    }

    /// Builds the detector configuration, reading the threshold and label map side files.
    pub fn from_settings(settings: &Detector) -> Self {
        let mut cfg = FaceLivenessConfig::new(&settings.model_path);

        let default_threshold = settings.threshold.unwrap_or(DEFAULT_THRESHOLD);
        cfg.threshold = match &settings.threshold_file {
            Some(path) => read_threshold(path, default_threshold),
            None => default_threshold,
        };

        if let Some(size) = settings.input_size {
            cfg.image_size = (size, size);
        }
        if let Some(layout) = &settings.layout {
            match TensorLayout::parse(layout) {
                Some(layout) => cfg.layout = layout,
                None => warn!("unknown tensor layout [{layout}], using {:?}", cfg.layout),
            }
        }
        if let Some(threads) = settings.intra_threads {
            cfg.intra_threads = threads.max(1);
        }
        cfg.flip_labels = settings.flip_labels;
        cfg.label_map = settings.label_map_file.as_deref().and_then(load_label_map);
        cfg
    }
}

/// Reads a decision threshold from a text file, falling back to `default`
/// when the file is absent, unreadable, unparsable or outside `[0, 1]`.
pub fn read_threshold(path: impl AsRef<Path>, default: f32) -> f32 {
    let path = path.as_ref();
    if !path.exists() {
        return default;
    }
    match fs::read_to_string(path) {
        Ok(content) => match content.trim().parse::<f32>() {
            Ok(value) if (0.0..=1.0).contains(&value) => value,
            Ok(value) => {
                warn!("threshold {value} in {} is outside [0, 1]", path.display());
                default
            }
            Err(e) => {
                warn!("failed to parse threshold file {}: {e}", path.display());
                default
            }
        },
        Err(e) => {
            warn!("failed to read threshold file {}: {e}", path.display());
            default
        }
    }
}

/// Loads a `{"0": "fake", "1": "real"}` style label map. Invalid files are ignored.
pub fn load_label_map(path: impl AsRef<Path>) -> Option<LabelMap> {
    let path = path.as_ref();
    if !path.exists() {
        return None;
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("failed to read label map {}: {e}", path.display());
            return None;
        }
    };

    let raw: HashMap<String, String> = match serde_json::from_str(&content) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("failed to parse label map {}: {e}", path.display());
            return None;
        }
    };

    let mut label_map = LabelMap::with_capacity(raw.len());
    for (key, value) in raw {
        match key.trim().parse::<usize>() {
            Ok(idx) => {
                label_map.insert(idx, value);
            }
            Err(_) => {
                warn!("label map {} has a non-numeric key [{key}]", path.display());
                return None;
            }
        }
    }
    Some(label_map)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use tempfile::NamedTempFile;
    use super::*;

    fn temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_match_face_liveness() {
        assert_eq!(match_face_liveness(0), FaceLivenessClass::Fake);
        assert_eq!(match_face_liveness(1), FaceLivenessClass::Real);
        assert_eq!(match_face_liveness(7), FaceLivenessClass::Real);
    }

    #[test]
    fn test_read_threshold() {
        let file = temp_file(" 0.62\n");
        assert_eq!(read_threshold(file.path(), 0.5), 0.62);

        let file = temp_file("not a number");
        assert_eq!(read_threshold(file.path(), 0.5), 0.5);

        let file = temp_file("1.7");
        assert_eq!(read_threshold(file.path(), 0.4), 0.4);

        assert_eq!(read_threshold("/nonexistent/detector_threshold.txt", 0.45), 0.45);
    }

    #[test]
    fn test_load_label_map() {
        let file = temp_file(r#"{"0": "fake", "1": "real"}"#);
        let label_map = load_label_map(file.path()).unwrap();
        assert_eq!(label_map.get(&0).map(String::as_str), Some("fake"));
        assert_eq!(label_map.get(&1).map(String::as_str), Some("real"));

        let file = temp_file(r#"{"zero": "fake"}"#);
        assert!(load_label_map(file.path()).is_none());

        let file = temp_file("[1, 2");
        assert!(load_label_map(file.path()).is_none());

        assert!(load_label_map("/nonexistent/label_map.json").is_none());
    }

    #[test]
    fn test_tensor_layout_parse() {
        assert_eq!(TensorLayout::parse("NHWC"), Some(TensorLayout::Nhwc));
        assert_eq!(TensorLayout::parse("nchw"), Some(TensorLayout::Nchw));
        assert_eq!(TensorLayout::parse("chw"), None);
    }

    #[test]
    fn test_from_settings() {
        let threshold = temp_file("0.7");
        let settings = Detector {
            model_path: "saved_model/model.onnx".to_string(),
            threshold: Some(0.5),
            threshold_file: Some(threshold.path().to_string_lossy().to_string()),
            label_map_file: None,
            flip_labels: true,
            input_size: Some(128),
            layout: Some("nchw".to_string()),
            intra_threads: Some(0),
            require_model: false,
        };

        let cfg = FaceLivenessConfig::from_settings(&settings);
        assert_eq!(cfg.threshold, 0.7);
        assert_eq!(cfg.image_size, (128, 128));
        assert_eq!(cfg.layout, TensorLayout::Nchw);
        assert_eq!(cfg.intra_threads, 1);
        assert!(cfg.flip_labels);
        assert!(cfg.label_map.is_none());
    }
}
