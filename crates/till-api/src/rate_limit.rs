use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::error::AppError;

/// Fixed-window limiter on device pushes, keyed by device id.
#[derive(Clone)]
pub struct PushRateLimiter {
    state: Arc<Mutex<HashMap<String, RateWindow>>>,
    window: Duration,
    limit: u32,
    metrics: Arc<RateLimitMetrics>,
}

#[derive(Default)]
struct RateLimitMetrics {
    push_allowed: AtomicU64,
    push_limited: AtomicU64,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct RateLimitMetricsSnapshot {
    pub push_allowed: u64,
    pub push_limited: u64,
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    started_at: Instant,
    count: u32,
}

impl PushRateLimiter {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.rate_limit_window, config.push_rate_limit_per_window)
    }

    fn new(window: Duration, limit: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(HashMap::new())),
            window,
            limit,
            metrics: Arc::new(RateLimitMetrics::default()),
        }
    }

    pub async fn check(&self, device_id: &str) -> Result<(), AppError> {
        let now = Instant::now();
        let mut guard = self.state.lock().await;

        // Forget windows that ended long ago so idle devices don't accumulate
        let window = self.window;
        guard.retain(|_, entry| now.duration_since(entry.started_at) < window * 2);

        let entry = guard.entry(device_id.to_string()).or_insert(RateWindow {
            started_at: now,
            count: 0,
        });

        if now.duration_since(entry.started_at) >= self.window {
            entry.started_at = now;
            entry.count = 0;
        }

        if entry.count >= self.limit {
            let retry_after_secs = self
                .window
                .saturating_sub(now.duration_since(entry.started_at))
                .as_secs();
            self.metrics.push_limited.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                device = device_fingerprint(device_id),
                retry_after_secs,
                "Push rate limit exceeded"
            );
            return Err(AppError::too_many_requests(
                "Push rate limit exceeded for device",
                retry_after_secs,
            ));
        }

        entry.count += 1;
        self.metrics.push_allowed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn metrics_snapshot(&self) -> RateLimitMetricsSnapshot {
        RateLimitMetricsSnapshot {
            push_allowed: self.metrics.push_allowed.load(Ordering::Relaxed),
            push_limited: self.metrics.push_limited.load(Ordering::Relaxed),
        }
    }
}

/// Stable, non-reversible tag for logging a device id
pub fn device_fingerprint(device_id: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    device_id.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limiter_blocks_after_limit() {
        let limiter = PushRateLimiter::new(Duration::from_secs(60), 2);

        limiter.check("device-a").await.unwrap();
        limiter.check("device-a").await.unwrap();

        let err = limiter.check("device-a").await.unwrap_err();
        assert!(matches!(err, AppError::TooManyRequests(_, _)));

        let metrics = limiter.metrics_snapshot();
        assert_eq!(metrics.push_allowed, 2);
        assert_eq!(metrics.push_limited, 1);
    }

    #[tokio::test]
    async fn rate_limiter_tracks_devices_separately() {
        let limiter = PushRateLimiter::new(Duration::from_secs(60), 1);

        limiter.check("device-a").await.unwrap();
        limiter.check("device-b").await.unwrap();
        assert!(limiter.check("device-a").await.is_err());
    }
}
