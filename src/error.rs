//! Error types for fetchtube

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

/// Main error type for fetchtube operations
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Too many requests, retry in {}s", .retry_after.as_secs().max(1))]
    RateLimited { retry_after: Duration },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Extraction blocked: {0}")]
    ExtractionBlocked(String),

    #[error("All extraction strategies failed: {0}")]
    ExtractionFailed(String),

    #[error("Downloaded file could not be located: {0}")]
    FileNotResolved(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Check if another persona may still succeed after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::ExtractionBlocked(_) | ServiceError::ExtractionFailed(_)
        )
    }

    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::RateLimited { .. } => "rate_limited",
            ServiceError::InvalidInput(_) => "invalid_input",
            ServiceError::ResourceUnavailable(_) => "resource_unavailable",
            ServiceError::ExtractionBlocked(_) => "extraction_blocked",
            ServiceError::ExtractionFailed(_) => "extraction_failed",
            ServiceError::FileNotResolved(_) => "file_not_resolved",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::IoError(_) | ServiceError::JsonError(_) | ServiceError::Internal(_) => {
                "internal"
            }
        }
    }

    /// HTTP status used when the error reaches a caller
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::ResourceUnavailable(_) | ServiceError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ServiceError::ExtractionBlocked(_) | ServiceError::ExtractionFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            ServiceError::FileNotResolved(_)
            | ServiceError::IoError(_)
            | ServiceError::JsonError(_)
            | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Suggested wait before retrying, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ServiceError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// JSON payload returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(kind = self.kind(), "request failed: {}", self);
        }

        // Round up so a client never retries before the window frees a slot
        let retry_after_secs = self
            .retry_after()
            .map(|wait| wait.as_secs() + u64::from(wait.subsec_nanos() > 0));

        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
            retry_after_secs,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after_secs {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ServiceError::InvalidInput("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::RateLimited {
                retry_after: Duration::from_secs(3)
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ServiceError::ResourceUnavailable("private".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ExtractionFailed("boom".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_retryable() {
        assert!(ServiceError::ExtractionBlocked("bot".into()).is_retryable());
        assert!(!ServiceError::ResourceUnavailable("gone".into()).is_retryable());
        assert!(!ServiceError::InvalidInput("bad".into()).is_retryable());
    }

    #[test]
    fn test_rate_limited_response_carries_retry_after() {
        let response = ServiceError::RateLimited {
            retry_after: Duration::from_millis(12_500),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "13"
        );
    }
}
