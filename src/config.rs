//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::upstream::{GEMINI_DEFAULT_BASE_URL, GEMINI_DEFAULT_MODEL};

/// Which upstream provider answers cache and store misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Http,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "http" => Ok(ProviderKind::Http),
            other => Err(format!("unknown upstream provider '{}'", other)),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Deployment name, only reported in logs
    pub environment: String,
    /// Lifetime of a cached record
    pub cache_ttl: Duration,
    /// Period of the expired-entry sweep
    pub sweep_interval: Duration,
    /// Minimum gap between two revalidations of the same subject
    pub reconcile_cooldown: Duration,
    /// Ceiling for a single upstream fetch
    pub upstream_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    /// Frames queued per live connection before it is dropped as too slow
    pub outbound_capacity: usize,
    pub provider: ProviderKind,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    /// Base URL of the secondary JSON service
    pub college_api_url: Option<String>,
    /// File the record store is persisted to, if any
    pub store_snapshot_path: Option<PathBuf>,
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn secs_or(key: &str, default: u64) -> Duration {
    Duration::from_secs(parse_or(key, default))
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `PORT` - HTTP server port (default: 9000)
    /// - `ENVIRONMENT` - Deployment name (default: development)
    /// - `CACHE_TTL_SECS` - Cached record lifetime (default: 3600)
    /// - `SWEEP_INTERVAL_SECS` - Expired-entry sweep period (default: 300)
    /// - `RECONCILE_COOLDOWN_SECS` - Revalidation cooldown per subject (default: 60)
    /// - `UPSTREAM_TIMEOUT_SECS` - Upstream fetch ceiling (default: 30)
    /// - `HEARTBEAT_INTERVAL_SECS` - Live ping period (default: 25)
    /// - `READ_TIMEOUT_SECS` - Live read deadline (default: 60)
    /// - `WRITE_TIMEOUT_SECS` - Live write bound (default: 10)
    /// - `OUTBOUND_QUEUE_CAPACITY` - Live frames queued per connection (default: 64)
    /// - `UPSTREAM_PROVIDER` - `gemini` or `http` (default: gemini)
    /// - `GEMINI_API_KEY`, `GEMINI_MODEL`, `GEMINI_BASE_URL`
    /// - `COLLEGE_API_URL` - Base URL for the `http` provider
    /// - `STORE_SNAPSHOT_PATH` - Persist records to this JSON file
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_or("PORT", defaults.server_port),
            environment: non_empty("ENVIRONMENT").unwrap_or(defaults.environment),
            cache_ttl: secs_or("CACHE_TTL_SECS", 3600),
            sweep_interval: secs_or("SWEEP_INTERVAL_SECS", 300),
            reconcile_cooldown: secs_or("RECONCILE_COOLDOWN_SECS", 60),
            upstream_timeout: secs_or("UPSTREAM_TIMEOUT_SECS", 30),
            heartbeat_interval: secs_or("HEARTBEAT_INTERVAL_SECS", 25),
            read_timeout: secs_or("READ_TIMEOUT_SECS", 60),
            write_timeout: secs_or("WRITE_TIMEOUT_SECS", 10),
            outbound_capacity: parse_or("OUTBOUND_QUEUE_CAPACITY", defaults.outbound_capacity),
            provider: parse_or("UPSTREAM_PROVIDER", defaults.provider),
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            gemini_model: non_empty("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: non_empty("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            college_api_url: non_empty("COLLEGE_API_URL"),
            store_snapshot_path: non_empty("STORE_SNAPSHOT_PATH").map(PathBuf::from),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 9000,
            environment: "development".to_string(),
            cache_ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(300),
            reconcile_cooldown: Duration::from_secs(60),
            upstream_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(25),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            outbound_capacity: 64,
            provider: ProviderKind::Gemini,
            gemini_api_key: None,
            gemini_model: GEMINI_DEFAULT_MODEL.to_string(),
            gemini_base_url: GEMINI_DEFAULT_BASE_URL.to_string(),
            college_api_url: None,
            store_snapshot_path: None,
        }
    }
}
