use std::path::PathBuf;
use std::sync::Arc;
use crate::pipeline::liveness_pipeline::liveness_pipeline::LivenessPipeline;
use crate::repository::detection_log_repository::DetectionLogRepository;
use crate::service::detection_service::DetectionService;

#[derive(Clone)]
pub struct DetectionState {
    pub detection_service: DetectionService,
}

impl DetectionState {
    pub fn new(pipeline: &Arc<LivenessPipeline>, repository: DetectionLogRepository, upload_dir: PathBuf) -> Self {
        Self {
            detection_service: DetectionService::new(pipeline, repository, upload_dir),
        }
    }
}
