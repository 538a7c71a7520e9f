use crate::cache::SharedCache;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Result cache. Default: in-process `AnalyticsCache`. Swap via CACHE_BACKEND.
    pub cache: SharedCache,
}
