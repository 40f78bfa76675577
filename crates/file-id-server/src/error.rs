//! Maps [`file_id_index::FileIdError`] onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use file_id_index::FileIdError;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Thin wrapper so the handlers can `?`-propagate `FileIdError` directly;
/// store/config failures are systemic and map to 500, matching §7's
/// "systemic errors surface to the host logger" propagation rule.
pub struct ApiError(FileIdError);

impl From<FileIdError> for ApiError {
    fn from(error: FileIdError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "request failed");
        let body = Json(ErrorBody { error: self.0.to_string() });
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

pub fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error: message.into() })).into_response()
}

pub fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorBody { error: "not found".to_string() })).into_response()
}
