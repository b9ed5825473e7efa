use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::core::requests::{RequestError, RequestStatus, ValidationErrors};

/// Every failure the HTTP boundary can report, already mapped to its wire
/// shape.
#[derive(Debug)]
pub(crate) enum ApiError {
    InvalidPayload {
        message: &'static str,
        errors: ValidationErrors,
    },
    UnsupportedStatus,
    NotFound,
    Unauthorized,
    QueueFailed {
        request_id: String,
    },
    Conflict {
        request_id: String,
        status: RequestStatus,
    },
    Internal,
}

impl ApiError {
    pub(crate) fn invalid_request(errors: ValidationErrors) -> Self {
        ApiError::InvalidPayload {
            message: "Invalid request payload",
            errors,
        }
    }

    pub(crate) fn invalid_result(errors: ValidationErrors) -> Self {
        ApiError::InvalidPayload {
            message: "Invalid result payload",
            errors,
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Validation(errors) => ApiError::invalid_request(errors),
            RequestError::UnsupportedStatus(_) => ApiError::UnsupportedStatus,
            RequestError::NotFound(_) => ApiError::NotFound,
            RequestError::DispatchFailed { request_id, .. } => {
                ApiError::QueueFailed { request_id }
            }
            RequestError::TerminalConflict { request_id, status } => {
                ApiError::Conflict { request_id, status }
            }
            RequestError::Store(e) => {
                error!("Storage failure: {}", e);
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::InvalidPayload { message, errors } => (
                StatusCode::BAD_REQUEST,
                json!({ "message": message, "errors": errors }),
            ),
            ApiError::UnsupportedStatus => (
                StatusCode::BAD_REQUEST,
                json!({ "message": "Unsupported status" }),
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "message": "Request not found" }),
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "message": "Unauthorized" }),
            ),
            ApiError::QueueFailed { request_id } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "message": "Failed to queue agent request", "request_id": request_id }),
            ),
            ApiError::Conflict { request_id, status } => (
                StatusCode::CONFLICT,
                json!({
                    "message": "Request already finalized",
                    "request_id": request_id,
                    "status": status,
                }),
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "message": "Internal server error" }),
            ),
        };
        (status, Json(body)).into_response()
    }
}
