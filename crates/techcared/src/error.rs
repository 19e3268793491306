//! HTTP error mapping for handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use techcare_shared::api::ApiErrorBody;
use techcare_shared::TechcareError;
use tracing::error;

/// Handler error: a `TechcareError` rendered as `{"code","message"}`
#[derive(Debug)]
pub struct ApiError(pub TechcareError);

pub type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

impl From<TechcareError> for ApiError {
    fn from(err: TechcareError) -> Self {
        ApiError(err)
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError(TechcareError::Io(err))
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError(TechcareError::Internal(err.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("  Request failed: {}", self.0);
        }
        let body = ApiErrorBody {
            code: self.0.code().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
