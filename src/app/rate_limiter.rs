use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::rate_limits::{unix_now, window_index, IpAction, RateWindow};
use crate::infra::cache::RedisCache;

/// Fixed-window counters keyed by client IP and action.
#[derive(Clone)]
pub struct RateLimiter {
    backend: CounterBackend,
}

#[derive(Clone)]
enum CounterBackend {
    Redis(RedisCache),
    Memory(Arc<Mutex<HashMap<String, MemoryCounter>>>),
}

struct MemoryCounter {
    count: u32,
    expires_at: u64,
}

impl RateLimiter {
    pub fn redis(cache: RedisCache) -> Self {
        Self {
            backend: CounterBackend::Redis(cache),
        }
    }

    /// Counters held in this process only; each replica limits on its own.
    pub fn in_memory() -> Self {
        Self {
            backend: CounterBackend::Memory(Arc::new(Mutex::new(HashMap::new()))),
        }
    }

    pub async fn ping(&self) -> Result<()> {
        match &self.backend {
            CounterBackend::Redis(cache) => cache.ping().await,
            CounterBackend::Memory(_) => Ok(()),
        }
    }

    /// Returns true when `ip` has used up `limit` for the current window.
    pub async fn check_ip_rate_limit(
        &self,
        ip: &str,
        action: IpAction,
        limit: u32,
        window: RateWindow,
    ) -> Result<bool> {
        let now = unix_now();
        let key = ip_key(ip, action, window, now);

        let count = match &self.backend {
            CounterBackend::Redis(cache) => cache.get_count(&key).await?,
            CounterBackend::Memory(counters) => {
                let counters = counters.lock().await;
                counters
                    .get(&key)
                    .filter(|counter| counter.expires_at > now)
                    .map(|counter| counter.count)
                    .unwrap_or(0)
            }
        };

        if count >= limit {
            tracing::debug!(
                ip = ip,
                action = action.as_str(),
                count = count,
                limit = limit,
                "IP rate limit exceeded"
            );
            return Ok(true);
        }

        Ok(false)
    }

    pub async fn increment_ip(&self, ip: &str, action: IpAction, window: RateWindow) -> Result<()> {
        let now = unix_now();
        let window_seconds = window.seconds();
        let key = ip_key(ip, action, window, now);

        match &self.backend {
            CounterBackend::Redis(cache) => {
                cache.incr_with_expiry(&key, window_seconds).await?;
            }
            CounterBackend::Memory(counters) => {
                let mut counters = counters.lock().await;
                counters.retain(|_, counter| counter.expires_at > now);
                let window_end = (window_index(now, window_seconds) + 1) * window_seconds;
                counters
                    .entry(key)
                    .or_insert(MemoryCounter {
                        count: 0,
                        expires_at: window_end,
                    })
                    .count += 1;
            }
        }

        Ok(())
    }
}

fn ip_key(ip: &str, action: IpAction, window: RateWindow, now: u64) -> String {
    format!(
        "ratelimit:ip:{}:{}:{}",
        ip,
        action.as_str(),
        window_index(now, window.seconds())
    )
}
