//! Type-safe error codes for API responses.
//!
//! Each code carries a string identifier for clients, an integer for log
//! correlation and a default message.
//!
//! ```rust
//! use axum_helpers::errors::ErrorCode;
//!
//! let code = ErrorCode::ServiceUnavailable;
//! assert_eq!(code.as_str(), "SERVICE_UNAVAILABLE");
//! assert_eq!(code.code(), 1011);
//! ```

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Client errors (1000-1099)
    /// Request body failed field validation
    ValidationError,

    /// Request body is not valid JSON for the target type
    JsonExtraction,

    /// Request was well-formed but its content was rejected
    BadRequest,

    /// No route or resource matched
    NotFound,

    /// HTTP method not supported by the route
    MethodNotAllowed,

    // Server errors
    InternalError,

    /// A downstream collaborator (index, store, model) failed
    ServiceUnavailable,

    /// Serializing a response body failed
    SerdeJsonError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::JsonExtraction => "JSON_EXTRACTION",
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::SerdeJsonError => "SERDE_JSON_ERROR",
        }
    }

    /// Integer code used in structured logs
    pub fn code(&self) -> i32 {
        match self {
            Self::ValidationError => 1001,
            Self::JsonExtraction => 1003,
            Self::NotFound => 1004,
            Self::InternalError => 1005,
            Self::BadRequest => 1006,
            Self::MethodNotAllowed => 1007,
            Self::ServiceUnavailable => 1011,
            Self::SerdeJsonError => 5001,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            Self::ValidationError => "Request validation failed",
            Self::JsonExtraction => "Request body could not be parsed",
            Self::BadRequest => "The request was rejected",
            Self::NotFound => "The requested resource was not found",
            Self::MethodNotAllowed => "The HTTP method is not allowed for this resource",
            Self::InternalError => "An unexpected error occurred",
            Self::ServiceUnavailable => "Service is temporarily unavailable",
            Self::SerdeJsonError => "Failed to encode the response",
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.code() < 2000 && !matches!(self, Self::InternalError | Self::ServiceUnavailable)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
