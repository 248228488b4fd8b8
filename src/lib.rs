pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use anyhow::Result;
use std::sync::Arc;

use crate::app::auth::TokenSettings;
use crate::app::rate_limiter::RateLimiter;
use crate::config::rate_limits::IpRateLimits;
use crate::config::{AppConfig, StoreBackend};
use crate::infra::store::SharedStore;
use crate::infra::{cache::RedisCache, db::Db, memory::MemoryStore};

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub rate_limiter: RateLimiter,
    pub ip_rate_limits: IpRateLimits,
    pub tokens: TokenSettings,
    pub admin_token: Option<String>,
}

impl AppState {
    /// Connects the configured backends and runs pending migrations.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let store: SharedStore = match config.store_backend {
            StoreBackend::Postgres => {
                let db = Db::connect(config).await?;
                if config.run_migrations {
                    db.migrate().await?;
                    tracing::info!("database migrations applied");
                }
                Arc::new(db)
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory store, data will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };

        let rate_limiter = match &config.redis_url {
            Some(redis_url) => RateLimiter::redis(RedisCache::connect(redis_url).await?),
            None => RateLimiter::in_memory(),
        };

        Ok(Self {
            store,
            rate_limiter,
            ip_rate_limits: config.ip_rate_limits,
            tokens: TokenSettings {
                access_key: config.paseto_access_key,
                refresh_key: config.paseto_refresh_key,
                access_ttl_minutes: config.access_ttl_minutes,
                refresh_ttl_days: config.refresh_ttl_days,
            },
            admin_token: config.admin_token.clone(),
        })
    }
}
