use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;
use serde_json::json;


#[derive(Copy, Clone, Debug, Serialize, PartialEq)]
#[repr(u16)]
pub enum ResponseCode {
    ErrorCodeInput = 2,
    ErrorCodeServer = 3,
    ErrorCodeTimeout = 4,
}

impl ResponseCode {
    pub fn response_code(v: ResponseCode) -> u16 {
        v as u16
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    BadRequest(#[from] BadRequestError),

    #[error("{0}")]
    Timeout(#[from] TimeoutError),

    #[error("{0}")]
    Server(#[from] ServerError),
}

impl Error {
    fn get_codes(&self) -> (StatusCode, u16) {
        match *self {
            // 4XX Errors
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, ResponseCode::response_code(ResponseCode::ErrorCodeInput)),

            // 5XX Errors
            Error::Server(_) => (StatusCode::INTERNAL_SERVER_ERROR, ResponseCode::response_code(ResponseCode::ErrorCodeServer)),
            Error::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, ResponseCode::response_code(ResponseCode::ErrorCodeTimeout)),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest(BadRequestError { message: message.into() })
    }

    pub fn server() -> Self {
        Error::Server(ServerError {})
    }

    pub fn timeout() -> Self {
        Error::Timeout(TimeoutError {})
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status_code, code) = self.get_codes();
        let message = self.to_string();
        let body = Json(json!({ "error": message, "code": code }));

        (status_code, body).into_response()
    }
}

#[derive(thiserror::Error, Debug, Serialize)]
#[error("{message}")]
pub struct BadRequestError {
    pub message: String,
}

#[derive(thiserror::Error, Debug, Serialize)]
#[error("Internal server error")]
pub struct ServerError {}

#[derive(thiserror::Error, Debug, Serialize)]
#[error("server timeout")]
pub struct TimeoutError {}
