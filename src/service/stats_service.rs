use anyhow::Error;
use chrono::{Days, NaiveDate, Utc};
use crate::models::detection_log_model::{DetectionLog, TimelinePoint};
use crate::models::stats_model::{RecentQuery, StatsSummaryOutput, StatsSummaryQuery};
use crate::repository::detection_log_repository::DetectionLogRepository;

#[derive(Clone)]
pub struct StatsService {
    repository: DetectionLogRepository,
}

impl StatsService {
    pub fn new(repository: DetectionLogRepository) -> Self {
        StatsService { repository }
    }

    pub async fn summary(&self, query: &StatsSummaryQuery) -> Result<StatsSummaryOutput, Error> {
        self.summary_at(query, Utc::now().date_naive()).await
    }

    async fn summary_at(&self, query: &StatsSummaryQuery, today: NaiveDate) -> Result<StatsSummaryOutput, Error> {
        let counts = self.repository.summary().await?;

        let timeline = if query.timeline {
            let since = today
                .checked_sub_days(Days::new(query.days() as u64 - 1))
                .unwrap_or(today);
            let points = self.repository.timeline(since).await?;
            Some(fill_timeline(points, since, today))
        } else {
            None
        };

        Ok(StatsSummaryOutput {
            total: counts.total,
            real: counts.real,
            fake: counts.fake,
            unknown: counts.unknown,
            average_confidence: counts.average_confidence,
            average_processing_time_ms: counts.average_processing_time_ms,
            timeline,
        })
    }

    /// Returns one page of recent logs and the overall log count.
    pub async fn recent(&self, query: &RecentQuery) -> Result<(Vec<DetectionLog>, i64), Error> {
        let logs = self.repository.recent(query.limit(), query.offset()).await?;
        let total = self.repository.count_total().await?;
        Ok((logs, total))
    }
}

/// Expands sparse per-day points to one entry per day in `[since, until]`.
pub fn fill_timeline(points: Vec<TimelinePoint>, since: NaiveDate, until: NaiveDate) -> Vec<TimelinePoint> {
    let mut points = points.into_iter().peekable();
    let mut filled = Vec::new();

    for date in since.iter_days().take_while(|d| *d <= until) {
        while points.peek().is_some_and(|p| p.date < date) {
            points.next();
        }
        match points.peek() {
            Some(p) if p.date == date => filled.extend(points.next()),
            _ => filled.push(TimelinePoint::empty(date)),
        }
    }
    filled
}
