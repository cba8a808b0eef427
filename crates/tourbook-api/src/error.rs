//! API error handling
//!
//! Author: hephaex@gmail.com

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tourbook_core::TourbookError;
use utoipa::ToSchema;

/// Response envelope shared by every service
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

/// API error body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Always `false`
    pub success: bool,
    /// Human-readable message
    pub message: String,
    /// Machine-readable error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(code.into()),
        }
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Malformed or invalid input (400)
    Validation(String),
    /// Identity missing or invalid (401)
    Unauthenticated(String),
    /// Identity valid but not permitted (403)
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    /// Request body over the configured limit (413)
    PayloadTooLarge(String),
    /// A dependency could not be reached or answered unexpectedly (502)
    ServiceUnavailable(String),
    Internal(String),
    Database(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::ServiceUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Validation(msg)
            | AppError::Unauthenticated(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::ServiceUnavailable(msg)
            | AppError::Internal(msg)
            | AppError::Database(msg) => f.write_str(msg),
            AppError::NotFound(resource) => write!(f, "{resource} not found"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            AppError::Validation(msg) => ApiError::new("VALIDATION_ERROR", msg.as_str()),
            AppError::Unauthenticated(msg) => ApiError::new("UNAUTHORIZED", msg.as_str()),
            AppError::Forbidden(msg) => ApiError::new("FORBIDDEN", msg.as_str()),
            AppError::NotFound(resource) => {
                ApiError::new("NOT_FOUND", format!("{resource} not found"))
            }
            AppError::Conflict(msg) => ApiError::new("CONFLICT", msg.as_str()),
            AppError::PayloadTooLarge(msg) => ApiError::new("PAYLOAD_TOO_LARGE", msg.as_str()),
            AppError::ServiceUnavailable(msg) => {
                ApiError::new("SERVICE_UNAVAILABLE", msg.as_str())
            }
            // Internal details stay in the logs
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                ApiError::new("INTERNAL_ERROR", "Internal server error")
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database operation failed");
                ApiError::new("DATABASE_ERROR", "Internal server error")
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<TourbookError> for AppError {
    fn from(err: TourbookError) -> Self {
        match err {
            TourbookError::NotFound(msg) => AppError::NotFound(msg),
            TourbookError::ValidationError(msg) => AppError::Validation(msg),
            TourbookError::Conflict(msg) => AppError::Conflict(msg),
            TourbookError::Unauthenticated(msg) => AppError::Unauthenticated(msg),
            TourbookError::AccessDenied { reason } => AppError::Forbidden(reason),
            err @ TourbookError::ServiceUnavailable { .. } => {
                AppError::ServiceUnavailable(err.to_string())
            }
            TourbookError::DatabaseError(msg) => AppError::Database(msg),
            TourbookError::ConfigError(msg) => {
                AppError::Internal(format!("Configuration error: {msg}"))
            }
            TourbookError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthenticated("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Forbidden("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::PayloadTooLarge("x".into()).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AppError::ServiceUnavailable("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Database("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_core_error_conversion() {
        let err: AppError = TourbookError::ServiceUnavailable {
            service: "user".to_string(),
            reason: "timeout".to_string(),
        }
        .into();
        assert!(matches!(err, AppError::ServiceUnavailable(ref m) if m == "user service unavailable: timeout"));

        let err: AppError = TourbookError::AccessDenied {
            reason: "admin only".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_error_body_shape() {
        let body = serde_json::to_value(ApiError::new("CONFLICT", "Email already registered"))
            .unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Email already registered");
        assert_eq!(body["error"], "CONFLICT");
    }

    #[test]
    fn test_success_body_omits_missing_data() {
        let body = serde_json::to_value(ApiResponse::message("Logged out")).unwrap();
        assert_eq!(body["success"], true);
        assert!(body.get("data").is_none());
    }
}
