//! Error types for the college statistics server
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Upstream Error ==
/// Failure categories reported by an upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// Missing or rejected credentials
    Unauthenticated,
    /// Provider quota exhausted; worth retrying later
    RateLimited,
    /// Credentials valid but access refused (revoked or leaked key)
    Forbidden,
    /// No answer within the fetch deadline
    Timeout,
    /// Answer could not be decoded into a college record
    MalformedResponse,
    /// Provider could not be reached or failed on its side
    Unreachable,
}

impl UpstreamErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamErrorKind::Unauthenticated => "unauthenticated",
            UpstreamErrorKind::RateLimited => "rate_limited",
            UpstreamErrorKind::Forbidden => "forbidden",
            UpstreamErrorKind::Timeout => "timeout",
            UpstreamErrorKind::MalformedResponse => "malformed_response",
            UpstreamErrorKind::Unreachable => "unreachable",
        }
    }

    /// Whether the same request may succeed if retried later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            UpstreamErrorKind::RateLimited
                | UpstreamErrorKind::Timeout
                | UpstreamErrorKind::Unreachable
        )
    }
}

impl std::fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by an upstream provider fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct UpstreamError {
    pub kind: UpstreamErrorKind,
    pub message: String,
}

impl UpstreamError {
    pub fn new(kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(after: std::time::Duration) -> Self {
        Self::new(
            UpstreamErrorKind::Timeout,
            format!("no response within {}s", after.as_secs_f64()),
        )
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::MalformedResponse, message)
    }
}

// == Store Error ==
/// Error returned by the durable store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

// == App Error Enum ==
/// Unified error type for request handling.
#[derive(Error, Debug)]
pub enum AppError {
    /// Nothing matched the query
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Upstream provider failed on the synchronous path
    #[error("Upstream failure: {0}")]
    Upstream(#[from] UpstreamError),

    /// Durable store failed
    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse::new(msg.clone())),
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::new(msg.clone()))
            }
            AppError::Upstream(err) => (
                upstream_status(err.kind),
                ErrorResponse::new(upstream_message(err.kind)).with_detail(err.message.clone()),
            ),
            AppError::Store(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("Storage failure").with_detail(err.to_string()),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new(msg.clone()),
            ),
        };

        (status, Json(body)).into_response()
    }
}

fn upstream_status(kind: UpstreamErrorKind) -> StatusCode {
    match kind {
        UpstreamErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        UpstreamErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        UpstreamErrorKind::Unreachable => StatusCode::SERVICE_UNAVAILABLE,
        UpstreamErrorKind::Unauthenticated
        | UpstreamErrorKind::Forbidden
        | UpstreamErrorKind::MalformedResponse => StatusCode::BAD_GATEWAY,
    }
}

fn upstream_message(kind: UpstreamErrorKind) -> &'static str {
    match kind {
        UpstreamErrorKind::RateLimited => "Upstream rate limit exceeded, try again later",
        UpstreamErrorKind::Timeout => "Upstream did not respond in time, try again later",
        UpstreamErrorKind::Unreachable => "Upstream unavailable, try again later",
        UpstreamErrorKind::Unauthenticated => "Upstream authentication failed, check the API key",
        UpstreamErrorKind::Forbidden => "Upstream refused access, the API key may be revoked",
        UpstreamErrorKind::MalformedResponse => "Upstream returned unusable data",
    }
}

// == Result Type Alias ==
/// Convenience Result type for request handling.
pub type Result<T> = std::result::Result<T, AppError>;
