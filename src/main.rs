//! College Stats - statistics server for colleges and universities
//!
//! Binary entry point: configuration, wiring, background tasks and the HTTP
//! server with graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use college_stats::config::{Config, ProviderKind};
use college_stats::store::{CollegeStore, MemoryStore};
use college_stats::upstream::{GeminiProvider, HttpProvider, SharedProvider};
use college_stats::{create_router, spawn_sweep_task, AppState};

/// Main entry point for the college statistics server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the durable store and build the upstream provider
/// 4. Start the background cache sweep
/// 5. Serve HTTP and WebSocket endpoints
/// 6. On SIGINT/SIGTERM stop accepting, then cancel background work
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "college_stats=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting College Stats Server");

    let config = Config::from_env();
    info!(
        environment = %config.environment,
        port = config.server_port,
        cache_ttl_secs = config.cache_ttl.as_secs(),
        sweep_interval_secs = config.sweep_interval.as_secs(),
        provider = ?config.provider,
        "Configuration loaded"
    );

    let store: Arc<dyn CollegeStore> = match &config.store_snapshot_path {
        Some(path) => Arc::new(
            MemoryStore::open(path)
                .await
                .with_context(|| format!("failed to open store snapshot {}", path.display()))?,
        ),
        None => {
            warn!("STORE_SNAPSHOT_PATH not set, records are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let provider = build_provider(&config)?;
    let state = AppState::from_config(&config, store, provider);

    let shutdown = CancellationToken::new();
    let sweep_handle = spawn_sweep_task(state.cache.clone(), config.sweep_interval, shutdown.clone());
    info!("Background sweep task started");

    let reconciler = state.reconciler.clone();
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    shutdown.cancel();
    reconciler.shutdown();
    if let Err(e) = sweep_handle.await {
        warn!(error = %e, "Sweep task ended abnormally");
    }

    info!("Server shutdown complete");
    Ok(())
}

fn build_provider(config: &Config) -> anyhow::Result<SharedProvider> {
    let client = reqwest::Client::builder()
        .timeout(config.upstream_timeout)
        .build()
        .context("failed to build HTTP client")?;

    let provider: SharedProvider = match config.provider {
        ProviderKind::Gemini => {
            if config.gemini_api_key.is_none() {
                warn!("GEMINI_API_KEY not set, upstream lookups will fail");
            }
            Arc::new(GeminiProvider::new(
                client,
                config.gemini_base_url.clone(),
                config.gemini_model.clone(),
                config.gemini_api_key.clone(),
            ))
        }
        ProviderKind::Http => {
            let Some(base_url) = config.college_api_url.clone() else {
                bail!("COLLEGE_API_URL is required when UPSTREAM_PROVIDER=http");
            };
            Arc::new(HttpProvider::new(client, base_url))
        }
    };
    Ok(provider)
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
