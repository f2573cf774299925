//! API Routes
//!
//! Configures the Axum router with all college statistics endpoints.

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    all_colleges_handler, cache_stats_handler, college_statistics_handler,
    colleges_by_country_handler, countries_handler, health_handler, search_handler, AppState,
};
use super::ws::{colleges_ws_handler, countries_ws_handler};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /api/college-statistics?college_name=` - Statistics for one college
/// - `GET /api/countries` - Known countries
/// - `GET /api/colleges-by-country?country=` - Summaries for one country
/// - `GET /api/search?university_name=` - Name search
/// - `GET /api/all-colleges` - Every stored college
/// - `GET /api/cache/stats` - Cache statistics
/// - `GET /api/health` - Health check endpoint
/// - `GET /ws/colleges?country=` - Live feed for one country
/// - `GET /ws/countries`, `GET /ws` - Live countries feed
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/college-statistics", get(college_statistics_handler))
        .route("/api/countries", get(countries_handler))
        .route("/api/colleges-by-country", get(colleges_by_country_handler))
        .route("/api/search", get(search_handler))
        .route("/api/all-colleges", get(all_colleges_handler))
        .route("/api/cache/stats", get(cache_stats_handler))
        .route("/api/health", get(health_handler))
        .route("/ws/colleges", get(colleges_ws_handler))
        .route("/ws/countries", get(countries_ws_handler))
        .route("/ws", get(countries_ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
