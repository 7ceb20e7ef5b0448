use axum::extract::Request;
use axum::middleware::Next;
use axum::response::IntoResponse;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use uuid::Uuid;
use crate::error::errors::Error;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Keeps a caller-supplied request id, otherwise stamps a fresh UUID on the request.
pub async fn generate_request_id_mw(mut req: Request, next: Next) -> Result<impl IntoResponse, Error> {
    let has_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.is_empty());

    if !has_id {
        let request_id = Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            req.headers_mut().insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }
    }

    Ok(next.run(req).await)
}

pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_default()
}
