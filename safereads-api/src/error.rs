//! Error types for safereads-api
//!
//! Every failure leaves the HTTP layer as
//! `{"error": {"code": ..., "message": ..., "details"?: ...}}`.
//! The quota signal is a dedicated `UPGRADE_REQUIRED` code with structured
//! details, so clients branch on the code rather than the message text.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use safereads_common::Error as CommonError;
use serde_json::{json, Value};
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No caller identity (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller not allowed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// safereads-common error
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.parts().0
    }

    /// Status, machine-readable code and optional structured details
    fn parts(&self) -> (StatusCode, &'static str, Option<Value>) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", None),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", None),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN", None),
            ApiError::Internal(_) | ApiError::Other(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", None)
            }
            ApiError::Common(err) => common_parts(err),
        }
    }
}

fn common_parts(err: &CommonError) -> (StatusCode, &'static str, Option<Value>) {
    match err {
        CommonError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
        CommonError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", None),
        CommonError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN", None),
        CommonError::QuotaExceeded {
            free_remaining,
            is_subscribed,
        } => (
            StatusCode::PAYMENT_REQUIRED,
            "UPGRADE_REQUIRED",
            Some(json!({
                "free_remaining": free_remaining,
                "is_subscribed": is_subscribed,
            })),
        ),
        CommonError::UpstreamRateLimited { .. } => {
            (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", None)
        }
        CommonError::Upstream { .. } => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", None),
        CommonError::ModelEmptyResponse | CommonError::ModelParse(_) => {
            (StatusCode::BAD_GATEWAY, "MODEL_ERROR", None)
        }
        CommonError::CoverNotIdentified => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "COVER_NOT_IDENTIFIED",
            None,
        ),
        CommonError::Config(_) => (StatusCode::SERVICE_UNAVAILABLE, "NOT_CONFIGURED", None),
        CommonError::Database(_) | CommonError::Io(_) | CommonError::Internal(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", None)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = self.parts();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %message, "Request failed");
        } else {
            tracing::debug!(code = error_code, error = %message, "Request rejected");
        }

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
