use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::controller::DispatchError;
use crate::optimizer::OptimizationError;

/// API error types that can be returned from handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A precondition is missing; the request may succeed later
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Inputs the optimizer rejects
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Error response that gets serialized to JSON
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string
    fn error_type(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::ValidationError(_) => "ValidationError",
            ApiError::Conflict(_) => "Conflict",
            ApiError::Unprocessable(_) => "Unprocessable",
            ApiError::ServiceUnavailable(_) => "ServiceUnavailable",
            ApiError::InternalError(_) => "InternalServerError",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();

        let message = match &self {
            ApiError::InternalError(_) => {
                tracing::error!(error = %self, "API error occurred");
                "An internal error occurred".to_string()
            }
            ApiError::ServiceUnavailable(_) => {
                tracing::warn!(error = %self, "Service unavailable");
                self.to_string()
            }
            _ => {
                tracing::debug!(error = %self, "Client error");
                self.to_string()
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
            details: None,
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<DispatchError> for ApiError {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::UnknownBattery(_)
            | DispatchError::UnknownProgram { .. }
            | DispatchError::UnknownAlarm { .. } => ApiError::NotFound(error.to_string()),
            DispatchError::AlarmHandled(_) => ApiError::Conflict(error.to_string()),
            DispatchError::Optimization(e) => e.into(),
            DispatchError::Storage(e) => ApiError::InternalError(format!("{e:#}")),
        }
    }
}

impl From<OptimizationError> for ApiError {
    fn from(error: OptimizationError) -> Self {
        match &error {
            OptimizationError::InvalidInput { retryable: true, .. } => {
                ApiError::Conflict(error.to_string())
            }
            OptimizationError::InvalidInput { .. } => ApiError::Unprocessable(error.to_string()),
            OptimizationError::SolverTimeout(_) => ApiError::ServiceUnavailable(error.to_string()),
            OptimizationError::InfeasibleModel(_) | OptimizationError::Solver(_) => {
                ApiError::InternalError(error.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError::InternalError(format!("{error:#}"))
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_dispatch_error_status_codes() {
        let cases = [
            (DispatchError::UnknownBattery(3), StatusCode::NOT_FOUND),
            (
                DispatchError::Optimization(OptimizationError::no_load_data()),
                StatusCode::CONFLICT,
            ),
            (
                DispatchError::Optimization(OptimizationError::invalid("p_max")),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                DispatchError::Optimization(OptimizationError::SolverTimeout(Duration::from_secs(5))),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                DispatchError::Optimization(OptimizationError::InfeasibleModel("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                DispatchError::UnknownAlarm { battery_id: 1, alarm_id: uuid::Uuid::nil() },
                StatusCode::NOT_FOUND,
            ),
            (DispatchError::AlarmHandled(uuid::Uuid::nil()), StatusCode::CONFLICT),
            (
                DispatchError::Storage(anyhow::anyhow!("disk")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status_code(), expected);
        }
    }

    #[test]
    fn test_error_types() {
        assert_eq!(ApiError::NotFound("test".to_string()).error_type(), "NotFound");
        assert_eq!(ApiError::Conflict("test".to_string()).error_type(), "Conflict");
    }

    #[test]
    fn test_error_display() {
        let error = ApiError::NotFound("battery 123".to_string());
        assert_eq!(error.to_string(), "Resource not found: battery 123");
    }
}
