//! Response DTOs for the college statistics API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::models::{College, StatisticItem};

/// Compact view of a college used by listings and live updates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollegeSummary {
    pub id: String,
    pub name: String,
    pub country: String,
    pub data: Vec<StatisticItem>,
}

impl CollegeSummary {
    /// Summary labelled with the country the caller asked for rather than
    /// the one stored on the record.
    pub fn for_country(college: &College, country: &str) -> Self {
        Self {
            id: college.college_name.clone(),
            name: college.college_name.clone(),
            country: country.to_string(),
            data: college.student_statistics.clone(),
        }
    }
}

impl From<&College> for CollegeSummary {
    fn from(college: &College) -> Self {
        Self::for_country(college, &college.country)
    }
}

/// Entry of the country list (GET /api/countries).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryEntry {
    pub id: String,
    pub name: String,
}

impl CountryEntry {
    /// Numbers the given countries from 1, skipping blank names.
    pub fn numbered<I, S>(names: I) -> Vec<CountryEntry>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter(|name| !name.as_ref().trim().is_empty())
            .enumerate()
            .map(|(i, name)| CountryEntry {
                id: (i + 1).to_string(),
                name: name.as_ref().to_string(),
            })
            .collect()
    }

    /// List served when the store has no countries to offer.
    pub fn defaults() -> Vec<CountryEntry> {
        Self::numbered([
            "India",
            "United States",
            "United Kingdom",
            "Canada",
            "Australia",
        ])
    }
}

/// Response body for the cache stats endpoint (GET /api/cache/stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            expired: stats.expired,
            total_entries: stats.total_entries,
        }
    }
}

/// Response body for the health endpoint (GET /api/health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    pub version: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_from_college() {
        let college = College::named("MIT", "United States")
            .with_statistics(vec![StatisticItem::new("Total", 11000)]);
        let summary = CollegeSummary::from(&college);

        assert_eq!(summary.id, "MIT");
        assert_eq!(summary.name, "MIT");
        assert_eq!(summary.country, "United States");
        assert_eq!(summary.data.len(), 1);
    }

    #[test]
    fn test_countries_numbered_skips_blank() {
        let entries = CountryEntry::numbered(["India", "", "  ", "Canada"]);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "1");
        assert_eq!(entries[1].id, "2");
        assert_eq!(entries[1].name, "Canada");
    }

    #[test]
    fn test_default_countries() {
        let entries = CountryEntry::defaults();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].name, "India");
    }

    #[test]
    fn test_stats_response_zero_requests() {
        let resp = StatsResponse::from(CacheStats::default());
        assert_eq!(resp.hit_rate, 0.0);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_error_response_detail_omitted() {
        let json = serde_json::to_string(&ErrorResponse::new("boom")).unwrap();
        assert!(!json.contains("detail"));

        let json = serde_json::to_string(&ErrorResponse::new("boom").with_detail("why")).unwrap();
        assert!(json.contains("why"));
    }
}
