use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Error};
use chrono::{DateTime, Utc};
use log::{error, info};
use crate::models::detection_log_model::NewDetectionLog;
use crate::models::detection_model::{round_confidence, DetectionInput, DetectionResultOutput};
use crate::pipeline::liveness_pipeline::liveness_pipeline::LivenessPipeline;
use crate::pipeline::utils::image::guess_extension;
use crate::repository::detection_log_repository::DetectionLogRepository;

#[derive(Clone)]
pub struct DetectionService {
    liveness_pipeline: Arc<LivenessPipeline>,
    repository: DetectionLogRepository,
    upload_dir: PathBuf,
}

impl DetectionService {
    pub fn new(liveness_pipeline: &Arc<LivenessPipeline>, repository: DetectionLogRepository, upload_dir: impl Into<PathBuf>) -> Self {
        DetectionService {
            liveness_pipeline: Arc::clone(liveness_pipeline),
            repository,
            upload_dir: upload_dir.into(),
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.liveness_pipeline.model_loaded()
    }

    /// Stores the upload, classifies it and appends the outcome to the detection log.
    pub async fn detect(&self, input: DetectionInput) -> Result<DetectionResultOutput, Error> {
        let image_path = self.store_upload(&input).await?;

        let pipeline = Arc::clone(&self.liveness_pipeline);
        let im_bytes = input.im_bytes.clone();
        let result = tokio::task::spawn_blocking(move || pipeline.extract(&im_bytes))
            .await
            .context("liveness task failed")?
            .map_err(|e| {
                error!("failed to run liveness detection: {e}");
                Error::from(e)
            })?;

        let log = self
            .repository
            .insert(NewDetectionLog {
                timestamp: Utc::now(),
                image_path: image_path.to_string_lossy().to_string(),
                prediction: result.prediction.to_string(),
                confidence: result.confidence as f64,
                attack_type: result.attack_type.clone(),
                processing_time_ms: result.processing_time_ms as i64,
                model_name: result.model_name.clone(),
            })
            .await
            .context("failed to persist detection log")?;

        info!(
            "detection {} logged: {} (conf={:.4}, {} ms, model={})",
            log.id, result.prediction, result.confidence, result.processing_time_ms, result.model_name
        );

        Ok(DetectionResultOutput {
            prediction: result.prediction,
            confidence: round_confidence(result.confidence),
            attack_type: result.attack_type,
            processing_time_ms: result.processing_time_ms,
            model_loaded: self.model_loaded(),
        })
    }

    async fn store_upload(&self, input: &DetectionInput) -> Result<PathBuf, Error> {
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .with_context(|| format!("failed to create upload dir {}", self.upload_dir.display()))?;

        let filename = upload_file_name(Utc::now(), guess_extension(&input.im_bytes));
        let path = self.upload_dir.join(filename);
        tokio::fs::write(&path, &input.im_bytes)
            .await
            .with_context(|| format!("failed to store upload {}", path.display()))?;
        Ok(path)
    }
}

/// `YYYYmmddHHMMSS` plus microseconds, e.g. `20261019120000123456.png`.
pub fn upload_file_name(now: DateTime<Utc>, extension: &str) -> String {
    format!("{}.{}", now.format("%Y%m%d%H%M%S%6f"), extension)
}
