//! Live update messages
//!
//! JSON frames pushed to WebSocket subscribers. Every frame carries a
//! `type` tag so clients can dispatch on it.

use serde::Serialize;

use super::{College, CollegeSummary, CountryEntry};

// == Live Event ==
/// Outbound message for live subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    /// Full snapshot of a country, sent once when a session starts.
    CollegesUpdate {
        colleges: Vec<CollegeSummary>,
        country: String,
        count: usize,
    },
    /// A college fetched from upstream for the first time.
    NewCollege {
        college: CollegeSummary,
        country: String,
    },
    /// A stored college whose statistics changed after revalidation.
    CollegeUpdated {
        college: CollegeSummary,
        country: String,
    },
    /// Current list of countries with stored colleges.
    CountriesUpdate {
        countries: Vec<CountryEntry>,
        count: usize,
    },
}

impl LiveEvent {
    pub fn colleges_update(country: impl Into<String>, colleges: &[College]) -> Self {
        let country = country.into();
        let colleges: Vec<CollegeSummary> = colleges
            .iter()
            .map(|college| CollegeSummary::for_country(college, &country))
            .collect();

        Self::CollegesUpdate {
            count: colleges.len(),
            colleges,
            country,
        }
    }

    pub fn new_college(college: &College) -> Self {
        Self::NewCollege {
            college: CollegeSummary::from(college),
            country: college.country.clone(),
        }
    }

    pub fn college_updated(college: &College) -> Self {
        Self::CollegeUpdated {
            college: CollegeSummary::from(college),
            country: college.country.clone(),
        }
    }

    pub fn countries_update(countries: Vec<CountryEntry>) -> Self {
        Self::CountriesUpdate {
            count: countries.len(),
            countries,
        }
    }

    /// Wire name of the event, as found in the `type` field.
    pub fn event_type(&self) -> &'static str {
        match self {
            LiveEvent::CollegesUpdate { .. } => "colleges_update",
            LiveEvent::NewCollege { .. } => "new_college",
            LiveEvent::CollegeUpdated { .. } => "college_updated",
            LiveEvent::CountriesUpdate { .. } => "countries_update",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatisticItem;

    #[test]
    fn test_new_college_shape() {
        let college = College::named("Alpha U", "India")
            .with_statistics(vec![StatisticItem::new("Total", 100)]);
        let event = LiveEvent::new_college(&college);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "new_college");
        assert_eq!(json["country"], "India");
        assert_eq!(json["college"]["id"], "Alpha U");
        assert_eq!(json["college"]["name"], "Alpha U");
        assert_eq!(json["college"]["data"][0]["value"], 100);
    }

    #[test]
    fn test_colleges_update_uses_requested_country() {
        let colleges = vec![
            College::named("Alpha U", "india"),
            College::named("Beta U", "INDIA"),
        ];
        let event = LiveEvent::colleges_update("India", &colleges);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "colleges_update");
        assert_eq!(json["count"], 2);
        assert_eq!(json["colleges"][1]["country"], "India");
        assert_eq!(event.event_type(), "colleges_update");
    }
}
