use axum::debug_handler;
use axum::extract::{Multipart, State};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use log::{error, info};
use opentelemetry::global;
use opentelemetry::trace::{Span, TraceContextExt, Tracer};
use crate::error::errors::Error;
use crate::logger::logger::RequestLogContext;
use crate::middleware::request_id_mw::request_id;
use crate::models::detection_model::{DetectionInput, DetectionResultOutput};
use crate::pipeline::module::face_liveness::DetectorError;
use crate::response::common_response::{GeneralResponseBuilder, GeneralResponseResult};
use crate::state::detection_state::DetectionState;
use crate::tracer::tracer::TRACER_NAME;

pub const IMAGE_FIELD: &str = "image";

#[debug_handler(state = DetectionState)]
pub async fn detect(headers: HeaderMap, State(state): State<DetectionState>, mut payload: Multipart) -> GeneralResponseResult<DetectionResultOutput> {
    let tracer = global::tracer(TRACER_NAME);
    let parent_ctx = opentelemetry::Context::new();
    let span = tracer
        .span_builder("liveness-detection")
        .start_with_context(&tracer, &parent_ctx);

    let _log_context = RequestLogContext::attach(request_id(&headers));

    let child_ctx = parent_ctx.with_span(span);
    let mut child = tracer.start_with_context("marshal-request", &child_ctx);
    info!("received liveness detection request");

    let mut im_bytes: Option<Bytes> = None;
    loop {
        let field = match payload.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                error!("failed to read multipart payload: {e}");
                return Err(Error::bad_request("failed to process image"));
            }
        };

        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        match field.bytes().await {
            Ok(data) => {
                if data.is_empty() {
                    return Err(Error::bad_request("image is empty"));
                }
                im_bytes = Some(data);
            }
            Err(e) => {
                error!("failed to retrieve image from request: {e}");
                return Err(Error::bad_request("failed to process image"));
            }
        }
    }

    let im_bytes = match im_bytes {
        Some(im_bytes) => im_bytes,
        None => return Err(Error::bad_request("No image provided")),
    };
    child.end();

    let mut child = tracer.start_with_context("detect-image", &child_ctx);
    let result = match state.detection_service.detect(DetectionInput { im_bytes }).await {
        Ok(result) => result,
        Err(e) => {
            error!("failed to detect liveness: {e:#}");
            return match e.downcast_ref::<DetectorError>() {
                Some(DetectorError::Decode(_)) => Err(Error::bad_request("failed to process image")),
                _ => Err(Error::server()),
            };
        }
    };
    info!("completed liveness detection: {}", result.prediction);
    child.end();

    Ok(GeneralResponseBuilder::new()
        .status_code(StatusCode::OK)
        .body(result)
        .build())
}
