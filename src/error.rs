//! Error taxonomy and HTTP mapping.
//!
//! Four failure classes exist: validation, rate limiting, storage and email
//! delivery. Validation and rate-limit failures carry user-facing messages
//! and map to 4xx responses. Storage and delivery failures map to 5xx with a
//! generic message; the internal detail is logged, never exposed.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::model::ApiResponse;

/// Failure while persisting the message list or its derived files.
///
/// Only raised on the write path. Read failures degrade to an empty store
/// inside [`crate::storage::MessageStore`] and never surface as errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("message file i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("message encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure in the external email capability.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// No usable provider is configured; every send fails fast.
    #[error("mail provider not configured: {0}")]
    Unconfigured(String),

    /// The provider was reached but refused or failed the send.
    #[error("mail send failed: {0}")]
    Send(String),
}

/// Top-level request error, mapped onto HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A submission field is malformed or too short. The message names the
    /// offending field.
    #[error("{0}")]
    Validation(String),

    /// Too many submissions from one client within the current window.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The requested message id does not exist.
    #[error("message not found")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Storage(_) | ApiError::Delivery(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to the caller. Internal detail from storage and
    /// delivery failures is deliberately replaced with generic wording.
    fn public_message(&self) -> String {
        match self {
            ApiError::Validation(reason) => reason.clone(),
            ApiError::RateLimited => {
                "Too many attempts. Please try again in 15 minutes.".to_string()
            }
            ApiError::NotFound => "Message not found.".to_string(),
            ApiError::Storage(_) => {
                "Failed to process your message. Please try again in a few minutes.".to_string()
            }
            ApiError::Delivery(_) => {
                "Email service is unavailable. Please reach out directly.".to_string()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }
        let body = ApiResponse {
            success: false,
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Delivery(DeliveryError::Unconfigured("no key".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_is_not_exposed() {
        let io = std::io::Error::other("disk exploded at /secret/path");
        let error = ApiError::Storage(StorageError::Io(io));

        assert!(!error.public_message().contains("secret"));
    }

    #[test]
    fn test_validation_reason_is_exposed() {
        let error = ApiError::Validation("Name must be at least 2 characters long.".into());
        assert!(error.public_message().contains("Name"));
    }
}
