use axum::debug_handler;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use http::StatusCode;
use log::error;
use serde::Serialize;
use crate::error::errors::Error;
use crate::models::detection_log_model::DetectionLog;
use crate::models::stats_model::{RecentQuery, StatsSummaryOutput, StatsSummaryQuery};
use crate::response::common_response::{GeneralResponseBuilder, GeneralResponseResult, ResponsePagination};
use crate::state::stats_state::StatsState;

#[derive(Serialize)]
pub struct RecentOutput {
    pub rows: Vec<DetectionLog>,
}

#[debug_handler(state = StatsState)]
pub async fn summary(State(state): State<StatsState>, query: Result<Query<StatsSummaryQuery>, QueryRejection>) -> GeneralResponseResult<StatsSummaryOutput> {
    let Query(query) = query.map_err(|e| Error::bad_request(e.body_text()))?;

    let summary = match state.stats_service.summary(&query).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("failed to aggregate detection stats: {e:#}");
            return Err(Error::server());
        }
    };

    Ok(GeneralResponseBuilder::new()
        .status_code(StatusCode::OK)
        .body(summary)
        .build())
}

#[debug_handler(state = StatsState)]
pub async fn recent(State(state): State<StatsState>, query: Result<Query<RecentQuery>, QueryRejection>) -> GeneralResponseResult<RecentOutput> {
    let Query(query) = query.map_err(|e| Error::bad_request(e.body_text()))?;

    let (rows, total) = match state.stats_service.recent(&query).await {
        Ok(page) => page,
        Err(e) => {
            error!("failed to list recent detections: {e:#}");
            return Err(Error::server());
        }
    };

    Ok(GeneralResponseBuilder::new()
        .status_code(StatusCode::OK)
        .body(RecentOutput { rows })
        .pagination(ResponsePagination {
            count: total.max(0) as u64,
            offset: query.offset(),
            limit: query.limit(),
        })
        .build())
}
