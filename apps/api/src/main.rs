use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trajectory_api::cache::{AnalyticsCache, CacheStore, RedisCache, SharedCache};
use trajectory_api::config::{CacheBackend, Config};
use trajectory_api::routes::build_router;
use trajectory_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on invalid env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Trajectory API v{}", env!("CARGO_PKG_VERSION"));

    let cache = SharedCache::new(build_store(&config)?);
    info!("Cache backend: {}", cache.store().backend());

    // Build app state
    let state = AppState {
        config: config.clone(),
        cache,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Memory backend by default; Redis when CACHE_BACKEND=redis.
fn build_store(config: &Config) -> Result<Arc<dyn CacheStore>> {
    match config.cache_backend {
        CacheBackend::Memory => Ok(Arc::new(AnalyticsCache::new())),
        CacheBackend::Redis => {
            let url = config
                .redis_url
                .clone()
                .context("REDIS_URL is required for the redis cache backend")?;
            let client = redis::Client::open(url)?;
            info!("Redis client initialized");
            Ok(Arc::new(RedisCache::new(
                client,
                config.cache_key_prefix.clone(),
            )))
        }
    }
}
