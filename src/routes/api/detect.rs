use axum::extract::DefaultBodyLimit;
use axum::Router;
use axum::routing::post;
use tower_http::limit::RequestBodyLimitLayer;
use crate::handler::detection_handler::detect;
use crate::state::detection_state::DetectionState;

pub fn new_detect_route(max_body_bytes: usize) -> Router<DetectionState> {

    let router = Router::new()
        .route("/detect", post(detect))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes));
    router
}
