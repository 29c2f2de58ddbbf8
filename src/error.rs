use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    BoxError, Json,
};
use serde_json::json;
use thiserror::Error;
use tower::timeout::error::Elapsed;

use crate::resolver::ResolveError;

/// Errors surfaced to HTTP clients as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("Failed to resolve source URL: {0}")]
    Resolution(#[from] ResolveError),

    #[error("Service is shutting down")]
    Unavailable,

    #[error("Request timed out")]
    Timeout,

    #[error("Not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("An unexpected error occurred. Please try again later.")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Resolution(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                "Expected 'Content-Type: application/json' header"
            }
            JsonRejection::JsonSyntaxError(_) => "JSON syntax error",
            JsonRejection::JsonDataError(_) => "JSON data structure mismatch",
            _ => "Unknown JSON parsing error",
        };
        Self::BadRequest(message)
    }
}

impl From<BoxError> for ApiError {
    fn from(err: BoxError) -> Self {
        if err.is::<Elapsed>() {
            Self::Timeout
        } else {
            tracing::error!("Internal error: {}", err);
            Self::Internal
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::error!(status_code = %status.as_u16(), error = %self, "Request error");
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}
