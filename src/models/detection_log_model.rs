use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct DetectionLog {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub image_path: String,
    pub prediction: String,
    pub confidence: f64,
    pub attack_type: Option<String>,
    pub processing_time_ms: Option<i64>,
    pub model_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewDetectionLog {
    pub timestamp: DateTime<Utc>,
    pub image_path: String,
    pub prediction: String,
    pub confidence: f64,
    pub attack_type: String,
    pub processing_time_ms: i64,
    pub model_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow, PartialEq)]
pub struct DetectionCounts {
    pub total: i64,
    pub real: i64,
    pub fake: i64,
    pub unknown: i64,
    pub average_confidence: Option<f64>,
    pub average_processing_time_ms: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub real: i64,
    pub fake: i64,
    pub unknown: i64,
    pub total: i64,
}

impl TimelinePoint {
    pub fn empty(date: NaiveDate) -> Self {
        TimelinePoint {
            date,
            real: 0,
            fake: 0,
            unknown: 0,
            total: 0,
        }
    }
}
