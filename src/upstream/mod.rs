//! Upstream Provider Module
//!
//! Sources of fresh college records: a prompt-completion API or a secondary
//! JSON service. Both are slow and rate limited, so callers go through
//! [`fetch_with_deadline`] and never retry inline.

pub mod decode;
mod gemini;
mod http;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::error::{UpstreamError, UpstreamErrorKind};
use crate::models::College;

pub use gemini::{
    GeminiProvider, DEFAULT_BASE_URL as GEMINI_DEFAULT_BASE_URL, DEFAULT_MODEL as GEMINI_DEFAULT_MODEL,
};
pub use http::HttpProvider;

// == College Provider ==
/// Black-box lookup of a college by name.
#[async_trait]
pub trait CollegeProvider: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<College, UpstreamError>;
}

/// Shared handle to a provider.
pub type SharedProvider = Arc<dyn CollegeProvider>;

// == Fetch With Deadline ==
/// Runs a provider fetch under a hard ceiling. Exceeding it is reported as
/// [`UpstreamErrorKind::Timeout`].
pub async fn fetch_with_deadline(
    provider: &dyn CollegeProvider,
    name: &str,
    deadline: Duration,
) -> Result<College, UpstreamError> {
    let started = tokio::time::Instant::now();
    let result = match tokio::time::timeout(deadline, provider.fetch(name)).await {
        Ok(result) => result,
        Err(_) => Err(UpstreamError::timeout(deadline)),
    };

    match &result {
        Ok(college) => debug!(
            subject = %name,
            college = %college.college_name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Upstream fetch succeeded"
        ),
        Err(e) => warn!(subject = %name, kind = %e.kind, error = %e.message, "Upstream fetch failed"),
    }
    result
}

/// Maps a non-success HTTP status from a provider to an error kind.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> UpstreamErrorKind {
    match status {
        StatusCode::UNAUTHORIZED => UpstreamErrorKind::Unauthenticated,
        StatusCode::FORBIDDEN => UpstreamErrorKind::Forbidden,
        StatusCode::TOO_MANY_REQUESTS => UpstreamErrorKind::RateLimited,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => UpstreamErrorKind::Timeout,
        StatusCode::BAD_REQUEST if body.contains("API key") || body.contains("API_KEY") => {
            UpstreamErrorKind::Unauthenticated
        }
        _ => UpstreamErrorKind::Unreachable,
    }
}

/// Maps a transport error from reqwest to an upstream error.
pub(crate) fn transport_error(err: reqwest::Error) -> UpstreamError {
    let kind = if err.is_timeout() {
        UpstreamErrorKind::Timeout
    } else if err.is_decode() {
        UpstreamErrorKind::MalformedResponse
    } else {
        UpstreamErrorKind::Unreachable
    };
    UpstreamError::new(kind, err.to_string())
}
