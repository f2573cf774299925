//! Domain records, request/response DTOs and live update messages.

pub mod college;
pub mod events;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use college::{College, FeesInfo, GenderRatio, StatisticItem};
pub use events::LiveEvent;
pub use requests::{CountryQuery, SearchQuery, StatisticsQuery};
pub use responses::{
    CollegeSummary, CountryEntry, ErrorResponse, HealthResponse, StatsResponse,
};
