use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use scheduling_engine::{SchedulingError, UnavailableReason};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Standard API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Error type/code
    pub error_type: String,
    /// Human-readable error message
    pub message: String,
    /// Timestamp when error occurred
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Suggested actions for resolving the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

/// Standard API success response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

/// Main API error enum
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl ApiError {
    /// Create a simple validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Scheduling(engine_err) => match engine_err {
                SchedulingError::SlotUnavailable {
                    reason: UnavailableReason::NotFound,
                    ..
                } => StatusCode::NOT_FOUND,
                SchedulingError::SlotUnavailable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                SchedulingError::CapacityExceeded { .. } => StatusCode::CONFLICT,
                SchedulingError::InvalidTransition { .. } => StatusCode::CONFLICT,
                SchedulingError::InvalidState { .. } => StatusCode::CONFLICT,
                SchedulingError::AppointmentNotFound(_) => StatusCode::NOT_FOUND,
                SchedulingError::SlotNotFound(_) => StatusCode::NOT_FOUND,
                SchedulingError::TransientConflict { .. } => StatusCode::SERVICE_UNAVAILABLE,
                SchedulingError::Validation(_) => StatusCode::BAD_REQUEST,
            },
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Scheduling(engine_err) => match engine_err {
                SchedulingError::SlotUnavailable { .. } => "slot_unavailable",
                SchedulingError::CapacityExceeded { .. } => "capacity_exceeded",
                SchedulingError::InvalidTransition { .. } => "invalid_transition",
                SchedulingError::InvalidState { .. } => "invalid_state",
                SchedulingError::AppointmentNotFound(_) | SchedulingError::SlotNotFound(_) => {
                    "not_found"
                }
                SchedulingError::TransientConflict { .. } => "transient_conflict",
                SchedulingError::Validation(_) => "validation_error",
            },
            ApiError::Validation { .. } => "validation_error",
            ApiError::Internal { .. } => "internal_error",
        }
    }

    /// Get suggested actions for resolving the error
    pub fn suggestions(&self) -> Option<Vec<String>> {
        match self {
            ApiError::Scheduling(SchedulingError::CapacityExceeded { .. }) => Some(vec![
                "Offer the patient a different slot for the same doctor".to_string(),
                "Re-query availability before retrying".to_string(),
            ]),
            ApiError::Scheduling(SchedulingError::SlotUnavailable { .. }) => Some(vec![
                "Refresh the availability list; this slot may have been deactivated or has passed"
                    .to_string(),
            ]),
            ApiError::Scheduling(SchedulingError::TransientConflict { .. }) => Some(vec![
                "Retry the request; the slot was under heavy concurrent booking".to_string(),
            ]),
            ApiError::Scheduling(SchedulingError::InvalidTransition { .. })
            | ApiError::Scheduling(SchedulingError::InvalidState { .. }) => Some(vec![
                "Reload the appointment to see its current status".to_string(),
            ]),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4().to_string();
        let status_code = self.status_code();

        // Log the error with correlation ID
        error!(
            error_id = %error_id,
            error_type = %self.error_type(),
            status_code = %status_code.as_u16(),
            error = %self,
            "API error occurred"
        );

        let error_response = ApiErrorResponse {
            error_id,
            error_type: self.error_type().to_string(),
            message: self.to_string(),
            timestamp: chrono::Utc::now(),
            suggestions: self.suggestions(),
        };

        (status_code, Json(error_response)).into_response()
    }
}

/// Helper function to create successful API responses
pub fn api_success<T>(data: T) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        data,
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
