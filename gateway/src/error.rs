//! Gateway error taxonomy and the backend status → client category policy.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tonic::{Code, Status};

/// Message used when a backend failure carries no text at all.
const FALLBACK_MESSAGE: &str = "gRPC error";

/// Client-facing failure kind, independent of backend status numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    BadRequest,
    NotFound,
    InternalError,
}

impl ErrorCategory {
    /// Map a numeric backend status code to a category.
    ///
    /// Total over `i32`: `3` (invalid argument) and `5` (not found) are the
    /// only codes with a dedicated category.
    pub fn from_backend_code(code: i32) -> Self {
        match code {
            3 => ErrorCategory::BadRequest,
            5 => ErrorCategory::NotFound,
            _ => ErrorCategory::InternalError,
        }
    }

    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorCategory::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::BadRequest => "BadRequest",
            ErrorCategory::NotFound => "NotFound",
            ErrorCategory::InternalError => "InternalError",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    /// Malformed, unknown or out-of-range inbound field. Never reaches the backend.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Timestamp string the codec could not turn into an instant.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Translate a backend failure into its client-facing error.
    ///
    /// The message comes from the status detail, then the code's generic
    /// description, then a fixed fallback.
    pub fn from_status(status: &Status) -> Self {
        let message = if !status.message().is_empty() {
            status.message().to_string()
        } else if status.code() != Code::Ok {
            status.code().description().to_string()
        } else {
            FALLBACK_MESSAGE.to_string()
        };

        match ErrorCategory::from_backend_code(status.code() as i32) {
            ErrorCategory::BadRequest => GatewayError::BadRequest(message),
            ErrorCategory::NotFound => GatewayError::NotFound(message),
            ErrorCategory::InternalError => GatewayError::Internal(message),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::Validation(_)
            | GatewayError::InvalidTimestamp(_)
            | GatewayError::BadRequest(_) => ErrorCategory::BadRequest,
            GatewayError::NotFound(_) => ErrorCategory::NotFound,
            GatewayError::Internal(_) => ErrorCategory::InternalError,
        }
    }
}

impl From<Status> for GatewayError {
    fn from(status: Status) -> Self {
        GatewayError::from_status(&status)
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorCategory,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let category = self.category();
        let body = ErrorBody {
            error: category,
            message: self.to_string(),
        };
        (category.status_code(), Json(body)).into_response()
    }
}
