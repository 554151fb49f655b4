//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use super::handlers::ApiResponse;
use crate::error::SplitterError;

/// Error returned by every handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Caller mistake; the message is shown as-is.
    BadRequest(String),
    PayloadTooLarge(String),
    /// The split exceeded its wall-clock budget.
    Timeout,
    /// Anything else. The detail is logged, never returned.
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal(detail: impl ToString) -> Self {
        ApiError::Internal(detail.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the caller.
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(message) | ApiError::PayloadTooLarge(message) => message,
            ApiError::Timeout => "Split took too long",
            ApiError::Internal(_) => "Internal server error",
        }
    }
}

impl From<SplitterError> for ApiError {
    fn from(e: SplitterError) -> Self {
        match e {
            SplitterError::Validation(message) => ApiError::BadRequest(message),
            SplitterError::Workbook(_) => ApiError::bad_request("Cannot read file"),
            SplitterError::NothingToExtract => ApiError::bad_request("No sheets could be extracted"),
            SplitterError::SheetNotFound(sheet) => {
                ApiError::BadRequest(format!("Sheet not found: {}", sheet))
            }
            other => ApiError::internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            error!(error = %detail, "Request failed");
        }
        let body = ApiResponse::<()>::err(self.message());
        (self.status(), Json(body)).into_response()
    }
}
