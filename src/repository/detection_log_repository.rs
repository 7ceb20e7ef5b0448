use std::str::FromStr;
use chrono::NaiveDate;
use log::{info, warn};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use crate::models::detection_log_model::{DetectionCounts, DetectionLog, NewDetectionLog, TimelinePoint};

const SCHEMA_SQL: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS detection_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        image_path TEXT NOT NULL,
        prediction VARCHAR(20) NOT NULL,
        confidence REAL NOT NULL,
        attack_type VARCHAR(50),
        processing_time_ms INTEGER,
        model_name VARCHAR(128)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_detection_logs_timestamp ON detection_logs(timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_detection_logs_prediction ON detection_logs(prediction)",
];

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await
}

#[derive(FromRow)]
struct TimelineRow {
    day: String,
    prediction: String,
    count: i64,
}

/// Append-only store of detection results.
#[derive(Debug, Clone)]
pub struct DetectionLogRepository {
    pool: SqlitePool,
}

impl DetectionLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DetectionLogRepository { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA_SQL {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("detection log schema applied");
        Ok(())
    }

    pub async fn insert(&self, log: NewDetectionLog) -> Result<DetectionLog, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO detection_logs
                (timestamp, image_path, prediction, confidence, attack_type, processing_time_ms, model_name)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.timestamp)
        .bind(&log.image_path)
        .bind(&log.prediction)
        .bind(log.confidence)
        .bind(&log.attack_type)
        .bind(log.processing_time_ms)
        .bind(&log.model_name)
        .execute(&self.pool)
        .await?;

        Ok(DetectionLog {
            id: result.last_insert_rowid(),
            timestamp: log.timestamp,
            image_path: log.image_path,
            prediction: log.prediction,
            confidence: log.confidence,
            attack_type: Some(log.attack_type),
            processing_time_ms: Some(log.processing_time_ms),
            model_name: Some(log.model_name),
        })
    }

    pub async fn count_total(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM detection_logs")
            .fetch_one(&self.pool)
            .await
    }

    pub async fn count_by_prediction(&self, prediction: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM detection_logs WHERE prediction = ?")
            .bind(prediction)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn summary(&self) -> Result<DetectionCounts, sqlx::Error> {
        sqlx::query_as::<_, DetectionCounts>(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN prediction = 'real' THEN 1 ELSE 0 END), 0) AS "real",
                COALESCE(SUM(CASE WHEN prediction = 'fake' THEN 1 ELSE 0 END), 0) AS fake,
                COALESCE(SUM(CASE WHEN prediction NOT IN ('real', 'fake') THEN 1 ELSE 0 END), 0) AS unknown,
                AVG(confidence) AS average_confidence,
                AVG(processing_time_ms) AS average_processing_time_ms
            FROM detection_logs
            "#,
        )
        .fetch_one(&self.pool)
        .await
    }

    /// Per-day counts from `since` (inclusive), only for days that have rows.
    pub async fn timeline(&self, since: NaiveDate) -> Result<Vec<TimelinePoint>, sqlx::Error> {
        let rows = sqlx::query_as::<_, TimelineRow>(
            r#"
            SELECT substr(timestamp, 1, 10) AS day, prediction, COUNT(*) AS count
            FROM detection_logs
            WHERE substr(timestamp, 1, 10) >= ?
            GROUP BY day, prediction
            ORDER BY day
            "#,
        )
        .bind(since.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut points: Vec<TimelinePoint> = Vec::new();
        for row in rows {
            let date = match NaiveDate::parse_from_str(&row.day, "%Y-%m-%d") {
                Ok(date) => date,
                Err(e) => {
                    warn!("skipping timeline row with malformed day [{}]: {e}", row.day);
                    continue;
                }
            };

            if points.last().map(|p| p.date) != Some(date) {
                points.push(TimelinePoint::empty(date));
            }
            if let Some(point) = points.last_mut() {
                match row.prediction.as_str() {
                    "real" => point.real += row.count,
                    "fake" => point.fake += row.count,
                    _ => point.unknown += row.count,
                }
                point.total += row.count;
            }
        }
        Ok(points)
    }

    /// Newest first.
    pub async fn recent(&self, limit: u32, offset: u64) -> Result<Vec<DetectionLog>, sqlx::Error> {
        sqlx::query_as::<_, DetectionLog>(
            r#"
            SELECT id, timestamp, image_path, prediction, confidence, attack_type, processing_time_ms, model_name
            FROM detection_logs
            ORDER BY timestamp DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use super::*;

    pub(crate) async fn memory_repository() -> DetectionLogRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let repository = DetectionLogRepository::new(pool);
        repository.migrate().await.unwrap();
        repository
    }

    fn new_log(timestamp: DateTime<Utc>, prediction: &str, confidence: f64, processing_time_ms: i64) -> NewDetectionLog {
        NewDetectionLog {
            timestamp,
            image_path: format!("uploads/{}.jpg", timestamp.format("%Y%m%d%H%M%S%f")),
            prediction: prediction.to_string(),
            confidence,
            attack_type: "unknown".to_string(),
            processing_time_ms,
            model_name: "model.onnx".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_counts() {
        let repository = memory_repository().await;
        let now = Utc::now();

        let first = repository.insert(new_log(now, "real", 0.9, 10)).await.unwrap();
        let second = repository.insert(new_log(now, "fake", 0.7, 30)).await.unwrap();
        repository.insert(new_log(now, "unknown", 0.5, 20)).await.unwrap();

        assert!(second.id > first.id);
        assert_eq!(repository.count_total().await.unwrap(), 3);
        assert_eq!(repository.count_by_prediction("real").await.unwrap(), 1);
        assert_eq!(repository.count_by_prediction("fake").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_summary() {
        let repository = memory_repository().await;

        let empty = repository.summary().await.unwrap();
        assert_eq!(empty, DetectionCounts::default());

        let now = Utc::now();
        repository.insert(new_log(now, "real", 0.8, 10)).await.unwrap();
        repository.insert(new_log(now, "real", 0.6, 30)).await.unwrap();
        repository.insert(new_log(now, "fake", 0.7, 20)).await.unwrap();

        let summary = repository.summary().await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.real, 2);
        assert_eq!(summary.fake, 1);
        assert_eq!(summary.unknown, 0);
        assert!((summary.average_confidence.unwrap() - 0.7).abs() < 1e-9);
        assert!((summary.average_processing_time_ms.unwrap() - 20.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_timeline() {
        let repository = memory_repository().await;
        let day_one = Utc.with_ymd_and_hms(2026, 10, 1, 8, 30, 0).unwrap();
        let day_two = day_one + Duration::days(1);
        let old = day_one - Duration::days(30);

        repository.insert(new_log(old, "real", 0.9, 5)).await.unwrap();
        repository.insert(new_log(day_one, "real", 0.9, 5)).await.unwrap();
        repository.insert(new_log(day_one, "fake", 0.8, 5)).await.unwrap();
        repository.insert(new_log(day_one + Duration::hours(3), "fake", 0.6, 5)).await.unwrap();
        repository.insert(new_log(day_two, "unknown", 0.5, 5)).await.unwrap();

        let timeline = repository.timeline(day_one.date_naive()).await.unwrap();
        assert_eq!(timeline.len(), 2);

        assert_eq!(timeline[0].date, day_one.date_naive());
        assert_eq!((timeline[0].real, timeline[0].fake, timeline[0].unknown, timeline[0].total), (1, 2, 0, 3));

        assert_eq!(timeline[1].date, day_two.date_naive());
        assert_eq!((timeline[1].real, timeline[1].fake, timeline[1].unknown, timeline[1].total), (0, 0, 1, 1));
    }

    #[tokio::test]
    async fn test_recent_is_newest_first() {
        let repository = memory_repository().await;
        let base = Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap();
        for i in 0..5 {
            repository.insert(new_log(base + Duration::minutes(i), "real", 0.9, i)).await.unwrap();
        }

        let recent = repository.recent(2, 0).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].timestamp, base + Duration::minutes(4));
        assert_eq!(recent[1].timestamp, base + Duration::minutes(3));
        assert_eq!(recent[0].model_name.as_deref(), Some("model.onnx"));

        let page = repository.recent(10, 4).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].timestamp, base);
    }
}
