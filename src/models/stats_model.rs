use serde::{Deserialize, Serialize};
use crate::models::detection_log_model::TimelinePoint;

pub const DEFAULT_TIMELINE_DAYS: u32 = 7;
pub const MAX_TIMELINE_DAYS: u32 = 365;
pub const DEFAULT_RECENT_LIMIT: u32 = 20;
pub const MAX_RECENT_LIMIT: u32 = 100;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct StatsSummaryQuery {
    #[serde(default)]
    pub timeline: bool,
    pub days: Option<u32>,
}

impl StatsSummaryQuery {
    pub fn days(&self) -> u32 {
        self.days.unwrap_or(DEFAULT_TIMELINE_DAYS).clamp(1, MAX_TIMELINE_DAYS)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<u32>,
    pub offset: Option<u64>,
}

impl RecentQuery {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_RECENT_LIMIT).clamp(1, MAX_RECENT_LIMIT)
    }

    pub fn offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StatsSummaryOutput {
    pub total: i64,
    pub real: i64,
    pub fake: i64,
    pub unknown: i64,
    pub average_confidence: Option<f64>,
    pub average_processing_time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Vec<TimelinePoint>>,
}
