use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{BoxError, Json, middleware, Router};
use axum::error_handling::HandleErrorLayer;
use axum::http::header;
use axum::routing::get;
use http::{Method, StatusCode, Uri};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower::timeout::error::Elapsed;
use tower::timeout::TimeoutLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::propagate_header::PropagateHeaderLayer;
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::services::ServeDir;
use crate::error::errors::Error;
use crate::middleware::request_id_mw::{generate_request_id_mw, REQUEST_ID_HEADER};
use crate::models::detection_model::HealthOutput;
use crate::pipeline::liveness_pipeline::liveness_pipeline::LivenessPipeline;
use crate::repository::detection_log_repository::DetectionLogRepository;
use crate::response::common_response::{GeneralResponseBuilder, GeneralResponseResult};
use crate::routes::api::detect::new_detect_route;
use crate::routes::api::stats::new_stats_route;
use crate::state::detection_state::DetectionState;
use crate::state::stats_state::StatsState;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024; /* 20mb */

#[derive(Clone, Serialize, Deserialize)]
struct FallbackResponse {
    message: String,
}

#[derive(Clone)]
pub struct RouterState {
    liveness_pipeline: Arc<LivenessPipeline>,
    repository: DetectionLogRepository,
    upload_dir: PathBuf,
    request_timeout: Duration,
    max_body_bytes: usize,
}

impl RouterState {
    pub fn new(liveness_pipeline: LivenessPipeline, repository: DetectionLogRepository, upload_dir: impl Into<PathBuf>) -> Self {
        RouterState {
            liveness_pipeline: Arc::new(liveness_pipeline),
            repository,
            upload_dir: upload_dir.into(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn request_timeout(mut self, request_timeout: Option<u64>) -> Self {
        if let Some(secs) = request_timeout {
            self.request_timeout = Duration::from_secs(secs);
        }
        self
    }

    pub fn max_body_bytes(mut self, max_body_bytes: Option<usize>) -> Self {
        if let Some(max_body_bytes) = max_body_bytes {
            self.max_body_bytes = max_body_bytes;
        }
        self
    }
}

pub fn root_routes(router_state: RouterState) -> Router {

    let api_router = {
        let detection_state = DetectionState::new(
            &router_state.liveness_pipeline,
            router_state.repository.clone(),
            router_state.upload_dir.clone(),
        );
        let detect_route = new_detect_route(router_state.max_body_bytes)
            .with_state(detection_state);

        let stats_state = StatsState::new(router_state.repository.clone());
        let stats_route = new_stats_route()
            .with_state(stats_state);

        Router::new()
            .merge(detect_route)
            .nest("/stats", stats_route)
    };

    let model_loaded = router_state.liveness_pipeline.model_loaded();
    let health_route = get(move || healthcheck(model_loaded));

    Router::new()
        .route("/", health_route.clone())
        .nest(
            "/api",
            Router::new()
                .route("/health", health_route)
                .merge(api_router)
                .layer(CompressionLayer::new()),
        )
        .nest_service("/uploads", ServeDir::new(&router_state.upload_dir))
        .fallback(fallback)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(router_state.request_timeout)),
        )
        .layer(PropagateHeaderLayer::new(header::HeaderName::from_static(REQUEST_ID_HEADER)))
        .layer(CorsLayer::permissive().allow_methods([Method::GET, Method::POST, Method::HEAD, Method::OPTIONS]))
        .layer(middleware::from_fn(generate_request_id_mw))
        .layer(SetSensitiveHeadersLayer::new(std::iter::once(header::AUTHORIZATION)))
}

async fn fallback(uri: Uri) -> (StatusCode, Json<FallbackResponse>) {
    (StatusCode::NOT_FOUND, Json(FallbackResponse {
        message: format!("No route for {uri}"),
    }))
}

async fn handle_middleware_error(err: BoxError) -> Error {
    if err.is::<Elapsed>() {
        warn!("request exceeded the configured timeout");
        return Error::timeout();
    }
    error!("unhandled middleware error: {err}");
    Error::server()
}

async fn healthcheck(model_loaded: bool) -> GeneralResponseResult<HealthOutput> {
    Ok(GeneralResponseBuilder::new()
        .status_code(StatusCode::OK)
        .body(HealthOutput {
            status: "backend running".to_string(),
            model_loaded,
        })
        .build())
}

#[cfg(test)]
mod tests {
    use std::io;
    use axum::body::Body;
    use axum::response::Response;
    use bytes::Bytes;
    use http::Request;
    use serde_json::Value;
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::TempDir;
    use tower::ServiceExt;
    use super::*;
    use crate::pipeline::model_config::config::FaceLivenessConfig;
    use crate::pipeline::module::face_liveness::FaceLiveness;
    use crate::pipeline::module::face_liveness::tests::FailingModel;
    use crate::pipeline::utils::image::tests::encoded_png;
    use crate::repository::detection_log_repository::tests::memory_repository;

    const BOUNDARY: &str = "liveguard-test-boundary";

    async fn test_app() -> (Router, TempDir) {
        app_with(LivenessPipeline::mock(), memory_repository().await, 5).await
    }

    async fn app_with(pipeline: LivenessPipeline, repository: DetectionLogRepository, timeout_secs: u64) -> (Router, TempDir) {
        let upload_dir = TempDir::new().unwrap();
        let state = RouterState::new(pipeline, repository, upload_dir.path())
            .request_timeout(Some(timeout_secs))
            .max_body_bytes(Some(1024 * 1024));
        (root_routes(state), upload_dir)
    }

    async fn assert_internal_error(response: Response) {
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["code"], 3);
    }

    fn multipart_request(field: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"face.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/api/detect")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_healthcheck() {
        let (app, _dir) = test_app().await;

        for uri in ["/", "/api/health"] {
            let response = app.clone().oneshot(get_request(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().contains_key(REQUEST_ID_HEADER));

            let body = body_json(response).await;
            assert_eq!(body["status"], "backend running");
            assert_eq!(body["model_loaded"], false);
        }
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let (app, _dir) = test_app().await;
        let request = Request::builder()
            .uri("/")
            .header(REQUEST_ID_HEADER, "req-42")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-42");
    }

    #[tokio::test]
    async fn test_detect_without_image() {
        let (app, _dir) = test_app().await;

        let response = app.oneshot(multipart_request("file", &encoded_png(4, 4))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "No image provided");
    }

    #[tokio::test]
    async fn test_detect_empty_image() {
        let (app, _dir) = test_app().await;

        let response = app.oneshot(multipart_request("image", b"")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "image is empty");
    }

    #[tokio::test]
    async fn test_detect_undecodable_image() {
        let (app, _dir) = test_app().await;

        let response = app.oneshot(multipart_request("image", b"plain text")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "failed to process image");
    }

    #[tokio::test]
    async fn test_detect_then_stats() {
        let (app, _dir) = test_app().await;

        let response = app.clone().oneshot(multipart_request("image", &encoded_png(16, 16))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["prediction"], "fake");
        assert_eq!(body["confidence"], 0.5);
        assert_eq!(body["attack_type"], "mock");
        assert_eq!(body["model_loaded"], false);
        assert!(body["processing_time_ms"].is_u64());

        let response = app.clone().oneshot(get_request("/api/stats/summary")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["real"], 0);
        assert_eq!(body["fake"], 1);
        assert!(body.get("timeline").is_none());

        let response = app.clone().oneshot(get_request("/api/stats/summary?timeline=true&days=3")).await.unwrap();
        let body = body_json(response).await;
        let timeline = body["timeline"].as_array().unwrap();
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline[2]["fake"], 1);

        let response = app.clone().oneshot(get_request("/api/stats/recent?limit=5")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-pagination-count"], "1");
        assert_eq!(response.headers()["x-pagination-limit"], "5");
        let body = body_json(response).await;
        let image_path = body["rows"][0]["image_path"].as_str().unwrap().to_string();

        let filename = std::path::Path::new(&image_path).file_name().unwrap().to_string_lossy().to_string();
        let response = app.oneshot(get_request(&format!("/uploads/{filename}"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_stats_query() {
        let (app, _dir) = test_app().await;

        let response = app.oneshot(get_request("/api/stats/summary?days=many")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_fallback() {
        let (app, _dir) = test_app().await;

        let response = app.oneshot(get_request("/unknown-route")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["message"], "No route for /unknown-route");
    }

    #[tokio::test]
    async fn test_detect_inference_failure() {
        let face_liveness = FaceLiveness::new(Arc::new(FailingModel), FaceLivenessConfig::new("model.onnx"));
        let repository = memory_repository().await;
        let (app, _dir) = app_with(LivenessPipeline::with_detector(face_liveness), repository.clone(), 5).await;

        let response = app.oneshot(multipart_request("image", &encoded_png(16, 16))).await.unwrap();
        assert_internal_error(response).await;
        assert_eq!(repository.count_total().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_detect_persistence_failure() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let (app, _dir) = app_with(LivenessPipeline::mock(), DetectionLogRepository::new(pool), 5).await;

        let response = app.oneshot(multipart_request("image", &encoded_png(16, 16))).await.unwrap();
        assert_internal_error(response).await;
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let (app, _dir) = app_with(LivenessPipeline::mock(), memory_repository().await, 1).await;
        let stalled = futures::stream::pending::<Result<Bytes, io::Error>>();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/detect")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from_stream(stalled))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["error"], "server timeout");
        assert_eq!(body["code"], 4);
    }
}
