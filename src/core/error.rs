//! Error types and handling for the LuxRig bridge.
//!
//! This module provides a unified error type [`AppError`] covering every failure a
//! handler can report, and implements proper HTTP response conversion. Every error
//! response is a JSON object carrying at least an `error` field.

use crate::core::logging::{get_provider_context, get_request_id};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

/// Hint returned to callers when local processing fails.
pub const CLOUD_FALLBACK_HINT: &str = "Try cloud provider";

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Client provided invalid data
    #[error("Bad request: {error}")]
    BadRequest {
        error: String,
        message: Option<String>,
    },

    /// A proxied local provider could not be reached
    #[error("Local provider not available: {0}")]
    ProviderUnavailable(String),

    /// The local provider failed to serve a routed chat request
    #[error("Local AI processing failed: {0}")]
    LocalChatFailed(String),

    /// Upstream did not answer within the configured deadline
    #[error("Gateway timeout")]
    Timeout,

    /// Rate limit exceeded errors
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Generic internal server errors with custom message
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(error: impl Into<String>) -> Self {
        AppError::BadRequest {
            error: error.into(),
            message: None,
        }
    }

    pub fn bad_request_with(error: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::BadRequest {
            error: error.into(),
            message: Some(message.into()),
        }
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) | AppError::LocalChatFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// JSON body for this error.
    pub fn body(&self) -> Value {
        match self {
            AppError::Internal(msg) => json!({
                "error": "Internal server error",
                "message": msg,
            }),
            AppError::ProviderUnavailable(msg) => json!({
                "error": "Local provider not available",
                "message": msg,
            }),
            AppError::BadRequest { error, message } => match message {
                Some(message) => json!({ "error": error, "message": message }),
                None => json!({ "error": error }),
            },
            AppError::LocalChatFailed(details) => json!({
                "error": "Local AI processing failed",
                "details": details,
                "fallback": CLOUD_FALLBACK_HINT,
            }),
            AppError::Timeout => json!({
                "error": "Gateway timeout",
                "message": "Upstream request timed out",
            }),
            AppError::RateLimitExceeded(msg) => json!({
                "error": "Too many requests",
                "message": msg,
            }),
        }
    }
}


impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let request_id = get_request_id();
        let provider = get_provider_context();
        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                provider = %provider,
                error = %self,
                "Request failed"
            );
        } else {
            tracing::debug!(
                request_id = %request_id,
                error = %self,
                status = status.as_u16(),
                "Request rejected"
            );
        }

        (status, Json(self.body())).into_response()
    }
}

/// Convenience type alias for Results using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
