//! Centralized API error handling for RideVault
//!
//! Every core operation fails with exactly one of these kinds. Handlers
//! return the error untouched; the HTTP mapping lives here so no kind is
//! ever collapsed into a generic failure on the way out.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Operation invalid for current state: {0}")]
    StateConflict(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("An active negotiation already exists for this captain on this ride")]
    DuplicateNegotiation,

    #[error("Auto fare cannot be less than {minimum}")]
    FareTooLow { minimum: i64 },

    #[error("Fare negotiation is only available for auto rides")]
    NegotiationNotAllowed,

    #[error("No pending negotiation found for this captain")]
    NegotiationNotFound,

    #[error("Invalid OTP")]
    InvalidOtp,

    #[error("No route found between the specified locations")]
    RouteNotFound,

    #[error("Routing service query limit exceeded, try again later")]
    RateLimited,

    #[error("{0}")]
    LimitExceeded(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Get the stable machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::NotAuthorized(_) => "NOT_AUTHORIZED",
            ApiError::StateConflict(_) => "STATE_CONFLICT",
            ApiError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            ApiError::DuplicateNegotiation => "DUPLICATE_NEGOTIATION",
            ApiError::FareTooLow { .. } => "FARE_TOO_LOW",
            ApiError::NegotiationNotAllowed => "NEGOTIATION_NOT_ALLOWED",
            ApiError::NegotiationNotFound => "NEGOTIATION_NOT_FOUND",
            ApiError::InvalidOtp => "INVALID_OTP",
            ApiError::RouteNotFound => "ROUTE_NOT_FOUND",
            ApiError::RateLimited => "RATE_LIMITED",
            ApiError::LimitExceeded(_) => "LIMIT_EXCEEDED",
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotAuthorized(_) => StatusCode::FORBIDDEN,
            ApiError::StateConflict(_) => StatusCode::CONFLICT,
            ApiError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::DuplicateNegotiation => StatusCode::CONFLICT,
            ApiError::FareTooLow { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NegotiationNotAllowed => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NegotiationNotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidOtp => StatusCode::UNAUTHORIZED,
            ApiError::RouteNotFound => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::LimitExceeded(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        match &self {
            ApiError::Database(_) | ApiError::Internal(_) | ApiError::ExternalService(_) => {
                tracing::error!(error = %message, code = %error_code, "Server error occurred");
            }
            _ => {
                tracing::debug!(error = %message, code = %error_code, "Client error occurred");
            }
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: error_code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            _ => ApiError::Database(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::ExternalService(err.to_string())
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ApiError::NotFound("ride".to_string()).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(ApiError::DuplicateNegotiation.error_code(), "DUPLICATE_NEGOTIATION");
        assert_eq!(
            ApiError::FareTooLow { minimum: 60 }.error_code(),
            "FARE_TOO_LOW"
        );
        assert_eq!(ApiError::RateLimited.error_code(), "RATE_LIMITED");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::StateConflict("wrong state".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::InsufficientBalance {
                required: 50,
                available: 20
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError::InvalidOtp.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::RateLimited.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_messages_carry_amounts() {
        let err = ApiError::InsufficientBalance {
            required: 50,
            available: 20,
        };
        let msg = err.to_string();
        assert!(msg.contains("50"));
        assert!(msg.contains("20"));

        let err = ApiError::FareTooLow { minimum: 60 };
        assert!(err.to_string().contains("60"));
    }
}
