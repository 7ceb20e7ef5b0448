use crate::repository::detection_log_repository::DetectionLogRepository;
use crate::service::stats_service::StatsService;

#[derive(Clone)]
pub struct StatsState {
    pub stats_service: StatsService,
}

impl StatsState {
    pub fn new(repository: DetectionLogRepository) -> Self {
        Self {
            stats_service: StatsService::new(repository),
        }
    }
}
