//! Maps [`xchain_engine::EngineError`] onto an HTTP response, following
//! `zkpf-backend`'s `ApiError`/`ErrorResponse`/`IntoResponse` shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use xchain_engine::EngineError;

pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

#[derive(serde::Serialize)]
struct ErrorResponse {
    error: String,
    error_code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.suggested_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            error: self.0.to_string(),
            error_code: self.0.error_code(),
        };
        (status, Json(body)).into_response()
    }
}
