//! Response envelope and HTTP error mapping
//!
//! Success responses wrap `{statusCode, data, message, success}`; errors
//! use `{statusCode, message, success: false, errors[]}`.

use crate::error::ArenaError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Standard success envelope
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::OK, data, message)
    }

    pub fn accepted(data: T, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::ACCEPTED, data, message)
    }

    pub fn with_status(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            data,
            message: message.into(),
            success: true,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Error envelope
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    status_code: u16,
    message: String,
    success: bool,
    errors: Vec<String>,
}

/// HTTP-facing error
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub errors: Vec<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast_ref::<ArenaError>() {
            Some(domain) => {
                let status = match domain {
                    ArenaError::BadInput { .. } => StatusCode::BAD_REQUEST,
                    ArenaError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
                    ArenaError::Forbidden { .. } => StatusCode::FORBIDDEN,
                    ArenaError::RoomNotFound { .. }
                    | ArenaError::ProblemNotFound { .. }
                    | ArenaError::UserNotFound { .. }
                    | ArenaError::ContestNotFound { .. }
                    | ArenaError::JobNotFound { .. } => StatusCode::NOT_FOUND,
                    ArenaError::Conflict { .. } => StatusCode::CONFLICT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("Internal error: {}", domain);
                    "Internal server error".to_string()
                } else {
                    domain.to_string()
                };
                Self::new(status, message)
            }
            None => {
                tracing::error!("Unhandled error: {:?}", error);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            status_code: self.status.as_u16(),
            message: self.message,
            success: false,
            errors: self.errors,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Result type alias for HTTP handlers
pub type ApiResult<T> = Result<T, ApiError>;
