//! Secondary JSON service provider.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::{classify_status, decode, transport_error, CollegeProvider};
use crate::error::UpstreamError;
use crate::models::College;

/// Fetches records from `GET {base_url}/college?name=...`.
///
/// The body may be the record itself or wrapped as `{"data": {...}}`.
pub struct HttpProvider {
    client: Client,
    base_url: String,
}

impl HttpProvider {
    pub fn new(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CollegeProvider for HttpProvider {
    async fn fetch(&self, name: &str) -> Result<College, UpstreamError> {
        let url = format!("{}/college", self.base_url);
        debug!(url = %url, subject = %name, "Requesting college from HTTP provider");

        let response = self
            .client
            .get(&url)
            .query(&[("name", name)])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(UpstreamError::malformed(format!("no record for '{}'", name)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::new(
                classify_status(status, &body),
                format!("HTTP {}: {}", status, body),
            ));
        }

        let body: Value = response.json().await.map_err(transport_error)?;
        let record = body.get("data").filter(|d| d.is_object()).unwrap_or(&body);
        decode::college_from_value(record)
    }
}
