//! Prompt-completion provider (Gemini `generateContent` REST API).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use super::{classify_status, decode, transport_error, CollegeProvider};
use crate::error::{UpstreamError, UpstreamErrorKind};
use crate::models::College;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Asks a generative model for a college record in a fixed JSON layout.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiProvider {
    pub fn new(client: Client, base_url: String, model: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Part {
    text: String,
}

impl GenerateResponse {
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .filter(|t| !t.trim().is_empty())
    }
}

#[async_trait]
impl CollegeProvider for GeminiProvider {
    async fn fetch(&self, name: &str) -> Result<College, UpstreamError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            UpstreamError::new(UpstreamErrorKind::Unauthenticated, "GEMINI_API_KEY is not set")
        })?;

        let request = GenerateRequest {
            contents: vec![json!({ "parts": [{ "text": prompt(name) }] })],
        };

        debug!(subject = %name, model = %self.model, "Requesting completion");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let kind = classify_status(status, &body);
            if kind == UpstreamErrorKind::Forbidden {
                error!("Completion API refused the key; it may be revoked or reported as leaked");
            }
            return Err(UpstreamError::new(kind, format!("HTTP {}: {}", status, body)));
        }

        let body: GenerateResponse = response.json().await.map_err(transport_error)?;
        let text = body
            .first_text()
            .ok_or_else(|| UpstreamError::malformed("empty completion"))?;

        decode::college_from_text(text)
    }
}

/// Prompt asking for the exact JSON layout that [`decode`] understands.
fn prompt(university: &str) -> String {
    format!(
        r#"You are a university data researcher. Provide comprehensive structured details for university: {university}

Return ONLY valid JSON (no markdown, no code blocks, no extra text) with these fields:
{{
  "college_name": "{university}",
  "country": "Country name",
  "about": "History, establishment year and location",
  "location": "City, State/Country",
  "summary": "2-3 sentence summary of reputation and strengths",
  "ug_programs": ["..."],
  "pg_programs": ["..."],
  "phd_programs": ["..."],
  "fees": {{
    "ug_yearly_min": 0, "ug_yearly_max": 0,
    "pg_yearly_min": 0, "pg_yearly_max": 0,
    "phd_yearly_min": 0, "phd_yearly_max": 0
  }},
  "scholarships": ["..."],
  "student_gender_ratio": {{"male_percentage": 0, "female_percentage": 0}},
  "faculty_staff": 0,
  "international_students": 0,
  "global_ranking": "Rank or band",
  "departments": ["..."],
  "student_statistics": [
    {{"category": "Total students (2025)", "value": 0}},
    {{"category": "Undergraduate (UG) students (2025)", "value": 0}},
    {{"category": "Postgraduate (PG) students (2025)", "value": 0}},
    {{"category": "Male students (2025)", "value": 0}},
    {{"category": "Female students (2025)", "value": 0}},
    {{"category": "International students (2025)", "value": 0}},
    {{"category": "Total students placed (2025)", "value": 0}},
    {{"category": "Placement rate (UG 4-year, 2025)", "value": 0}}
  ],
  "additional_details": [
    {{"category": "Student-faculty ratio", "value": 0}},
    {{"category": "Median CTC (2025)", "value": "..."}}
  ],
  "sources": ["https://..."]
}}

Provide realistic data based on actual records."#
    )
}
