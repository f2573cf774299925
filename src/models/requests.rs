//! Request DTOs for the college statistics API
//!
//! Query-string parameters accepted by the HTTP and WebSocket endpoints.

use serde::Deserialize;

/// Query for GET /api/college-statistics
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatisticsQuery {
    #[serde(default)]
    pub college_name: Option<String>,
}

/// Query for GET /api/search. Accepts `university_name` or the short `q`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub university_name: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
}

impl SearchQuery {
    /// The search term, preferring `university_name` over `q`.
    pub fn term(&self) -> Option<&str> {
        non_blank(self.university_name.as_deref()).or_else(|| non_blank(self.q.as_deref()))
    }
}

/// Query carrying a country selector, used by the by-country listing and by
/// the live colleges feed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountryQuery {
    #[serde(default)]
    pub country: Option<String>,
}

impl CountryQuery {
    pub fn country(&self) -> Option<&str> {
        non_blank(self.country.as_deref())
    }
}

impl StatisticsQuery {
    pub fn college_name(&self) -> Option<&str> {
        non_blank(self.college_name.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
