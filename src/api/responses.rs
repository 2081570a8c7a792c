// Response types for API endpoints

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::core::errors::AppError;

/// Error response structure for admin-facing endpoints
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Success response for a registration submission
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub id: String,
}

/// Success response for a receipt upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub arquivo: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub redis: String,
}

/// API error for admin-facing endpoints: `{"error": ...}` bodies
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub request_id: Option<String>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            request_id: None,
        }
    }

    /// Create a new API error with request ID
    pub fn with_request_id(status: StatusCode, message: impl Into<String>, request_id: String) -> Self {
        Self {
            status,
            message: message.into(),
            request_id: Some(request_id),
        }
    }

    /// Map a domain error, keeping its status but substituting an
    /// endpoint-specific message (storage details stay in the logs).
    pub fn from_app_error(err: &AppError, message: impl Into<String>) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
            request_id: self.request_id,
        });
        (self.status, body).into_response()
    }
}

/// Error for the public flow endpoints: `{"success": false, "message"}`
/// bodies, the shape the registration and payment pages display.
#[derive(Debug)]
pub struct FlowError {
    pub status: StatusCode,
    pub message: String,
}

impl FlowError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// A 400 carrying the user-facing validation reason verbatim.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into())
    }

    /// Map a domain error, keeping its status. Validation errors keep
    /// their own message; anything else gets the endpoint's generic one.
    pub fn from_app_error(err: &AppError, message: impl Into<String>) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match err {
            AppError::Validation(reason) => Self::new(status, reason.clone()),
            _ => Self::new(status, message),
        }
    }
}

impl IntoResponse for FlowError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}
