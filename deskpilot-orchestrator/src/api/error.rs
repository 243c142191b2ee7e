//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::JobError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    ServiceUnavailable(String),
    InternalError {
        message: String,
        details: Option<String>,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg, None)
            }
            ApiError::InternalError { message, details } => {
                tracing::error!("Internal error: {} {:?}", message, details);
                (StatusCode::INTERNAL_SERVER_ERROR, message, details)
            }
        };

        let body = match details {
            Some(details) => serde_json::json!({ "error": message, "details": details }),
            None => serde_json::json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Validation(msg) => ApiError::BadRequest(msg),
            err @ JobError::ResourceExhausted { .. } => ApiError::ServiceUnavailable(err.to_string()),
            JobError::ApplyFailed { details } => ApiError::InternalError {
                message: "Failed to apply manifests".to_string(),
                details: Some(details),
            },
            err => ApiError::InternalError {
                message: err.to_string(),
                details: None,
            },
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
