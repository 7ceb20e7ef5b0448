use axum::Router;
use axum::routing::get;
use crate::handler::stats_handler::{recent, summary};
use crate::state::stats_state::StatsState;

pub fn new_stats_route() -> Router<StatsState> {

    let router = Router::new()
        .route("/summary", get(summary))
        .route("/recent", get(recent));
    router
}
