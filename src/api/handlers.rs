//! API Handlers
//!
//! HTTP request handlers for each college statistics endpoint.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use tracing::debug;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::live::{SessionConfig, SubscriberRegistry};
use crate::models::{
    College, CollegeSummary, CountryEntry, CountryQuery, HealthResponse, SearchQuery,
    StatisticsQuery, StatsResponse,
};
use crate::services::{LookupService, Reconciler};
use crate::store::CollegeStore;
use crate::upstream::SharedProvider;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<TtlCache>,
    pub store: Arc<dyn CollegeStore>,
    pub registry: Arc<SubscriberRegistry>,
    pub reconciler: Arc<Reconciler>,
    pub lookup: Arc<LookupService>,
    pub session_config: SessionConfig,
}

impl AppState {
    /// Wires the cache, registry and services around a store and provider.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn CollegeStore>,
        provider: SharedProvider,
    ) -> Self {
        let cache = Arc::new(TtlCache::new(config.cache_ttl));
        let registry = Arc::new(SubscriberRegistry::new());
        let reconciler = Arc::new(Reconciler::new(
            provider.clone(),
            store.clone(),
            cache.clone(),
            registry.clone(),
            config.upstream_timeout,
            config.reconcile_cooldown,
        ));
        let lookup = Arc::new(LookupService::new(
            cache.clone(),
            store.clone(),
            provider,
            registry.clone(),
            reconciler.clone(),
            config.upstream_timeout,
        ));

        Self {
            cache,
            store,
            registry,
            reconciler,
            lookup,
            session_config: SessionConfig::from(config),
        }
    }
}

/// Handler for GET /api/college-statistics
pub async fn college_statistics_handler(
    State(state): State<AppState>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<College>> {
    let name = query
        .college_name()
        .ok_or_else(|| AppError::InvalidRequest("college_name required".to_string()))?;

    let college = state.lookup.get_statistics(name).await?;
    Ok(Json(college))
}

/// Handler for GET /api/countries
///
/// Never fails; an unreadable or empty store yields the default list.
pub async fn countries_handler(State(state): State<AppState>) -> Json<Vec<CountryEntry>> {
    Json(state.lookup.countries().await)
}

/// Handler for GET /api/colleges-by-country
///
/// Summaries echo `country` as the caller spelled it, like the live snapshot.
pub async fn colleges_by_country_handler(
    State(state): State<AppState>,
    Query(query): Query<CountryQuery>,
) -> Result<Json<Vec<CollegeSummary>>> {
    let country = query
        .country()
        .ok_or_else(|| AppError::InvalidRequest("country parameter required".to_string()))?;

    let colleges = state.lookup.colleges_by_country(country).await?;
    debug!(country = %country, count = colleges.len(), "Listed colleges by country");
    Ok(Json(colleges))
}

/// Handler for GET /api/search
///
/// Accepts the term as `university_name` or `q`.
pub async fn search_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<College>>> {
    let term = query
        .term()
        .ok_or_else(|| AppError::InvalidRequest("university_name required".to_string()))?;

    Ok(Json(state.lookup.search(term).await?))
}

/// Handler for GET /api/all-colleges
pub async fn all_colleges_handler(State(state): State<AppState>) -> Result<Json<Vec<College>>> {
    Ok(Json(state.lookup.all_colleges().await?))
}

/// Handler for GET /api/cache/stats
pub async fn cache_stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.cache.stats().await.into())
}

/// Handler for GET /api/health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use crate::store::MemoryStore;
    use crate::upstream::CollegeProvider;
    use async_trait::async_trait;

    struct EchoProvider;

    #[async_trait]
    impl CollegeProvider for EchoProvider {
        async fn fetch(&self, name: &str) -> std::result::Result<College, UpstreamError> {
            Ok(College::named(name, "India"))
        }
    }

    fn state(colleges: Vec<College>) -> AppState {
        AppState::from_config(
            &Config::default(),
            Arc::new(MemoryStore::with_colleges(colleges)),
            Arc::new(EchoProvider),
        )
    }

    #[tokio::test]
    async fn test_statistics_requires_name() {
        let query = StatisticsQuery {
            college_name: Some("  ".to_string()),
        };
        let result = college_statistics_handler(State(state(vec![])), Query(query)).await;
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_statistics_miss_goes_upstream() {
        let state = state(vec![]);
        let query = StatisticsQuery {
            college_name: Some("Alpha U".to_string()),
        };

        let Json(college) = college_statistics_handler(State(state.clone()), Query(query))
            .await
            .unwrap();

        assert_eq!(college.college_name, "Alpha U");
        assert_eq!(state.lookup.all_colleges().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_countries_handler_defaults() {
        let Json(countries) = countries_handler(State(state(vec![]))).await;
        assert_eq!(countries, CountryEntry::defaults());
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let Json(stats) = cache_stats_handler(State(state(vec![]))).await;
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.total_entries, 0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
