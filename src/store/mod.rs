//! Durable Store Module
//!
//! The collection of college records that outlives the in-process cache.
//! Handlers and services only see the [`CollegeStore`] trait.

mod memory;

use async_trait::async_trait;

use crate::cache::normalize_key;
use crate::error::StoreError;
use crate::models::College;

pub use memory::MemoryStore;

/// Convenience Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Filter ==
/// Query filters understood by every store. All matches ignore case and
/// surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollegeFilter {
    /// College name equals the given value
    NameExact(String),
    /// College name contains the given fragment
    NameContains(String),
    /// Country equals the given value
    Country(String),
    /// Every record
    All,
}

impl CollegeFilter {
    pub fn name(name: &str) -> Self {
        CollegeFilter::NameExact(normalize_key(name))
    }

    pub fn name_contains(fragment: &str) -> Self {
        CollegeFilter::NameContains(normalize_key(fragment))
    }

    pub fn country(country: &str) -> Self {
        CollegeFilter::Country(normalize_key(country))
    }

    /// Whether `college` satisfies the filter.
    pub fn matches(&self, college: &College) -> bool {
        match self {
            CollegeFilter::NameExact(name) => normalize_key(&college.college_name) == *name,
            CollegeFilter::NameContains(fragment) => {
                normalize_key(&college.college_name).contains(fragment.as_str())
            }
            CollegeFilter::Country(country) => normalize_key(&college.country) == *country,
            CollegeFilter::All => true,
        }
    }
}

// == College Store ==
/// Keyed collection of college records.
#[async_trait]
pub trait CollegeStore: Send + Sync {
    /// First record matching `filter`.
    async fn find_one(&self, filter: &CollegeFilter) -> StoreResult<Option<College>>;

    /// Every record matching `filter`, in insertion order.
    async fn find_many(&self, filter: &CollegeFilter) -> StoreResult<Vec<College>>;

    async fn insert_one(&self, college: College) -> StoreResult<()>;

    /// Replaces the first record matching `filter`. Returns whether a record
    /// matched.
    async fn update_one(&self, filter: &CollegeFilter, college: College) -> StoreResult<bool>;

    /// Distinct non-empty country names, in first-seen order.
    async fn distinct_countries(&self) -> StoreResult<Vec<String>>;
}
