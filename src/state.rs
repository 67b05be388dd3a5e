#[cfg(test)]
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::info;

use crate::cache::AnalyticsCache;
use crate::config::AppConfig;
#[cfg(test)]
use crate::config::{JwtConfig, RateLimitConfig, SessionBinding};
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<Store>,
    pub cache: Arc<AnalyticsCache>,
    pub started_at: Instant,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let store = Store::open(&config.data_dir)
            .await
            .with_context(|| format!("open data dir {}", config.data_dir.display()))?;
        info!(data_dir = %config.data_dir.display(), "store opened");
        Ok(Self::from_parts(config, Arc::new(store)))
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<Store>) -> Self {
        let cache = Arc::new(AnalyticsCache::new(Duration::from_secs(
            config.cache_ttl_seconds,
        )));
        Self {
            config,
            store,
            cache,
            started_at: Instant::now(),
        }
    }

    /// Drops process-lifetime state before exit.
    pub fn shutdown(&self) {
        let stats = self.cache.stats();
        info!(
            active = stats.active,
            expired = stats.expired,
            total = stats.total,
            "shutting down, clearing analytics cache"
        );
        self.cache.clear();
    }

    /// State over a scratch data directory, for tests.
    #[cfg(test)]
    pub async fn fake(data_dir: &Path) -> Self {
        Self::fake_with(data_dir, |_| {}).await
    }

    #[cfg(test)]
    pub async fn fake_with(data_dir: &Path, tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            environment: "test".into(),
            data_dir: data_dir.to_path_buf(),
            cache_ttl_seconds: 300,
            session_binding: SessionBinding::Session,
            rate_limit: RateLimitConfig {
                window_ms: 60_000,
                max_requests: 10_000,
            },
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 15,
                refresh_expires_in: "7d".into(),
            },
        };
        tweak(&mut config);
        let store = Store::open(data_dir).await.expect("open test store");
        Self::from_parts(Arc::new(config), Arc::new(store))
    }
}
