/*!
 * Per-key token-bucket rate limiting for outbound channel calls.
 *
 * Each key owns an independent bucket created lazily on first use; the
 * capacity and refill rate passed on that first call are frozen for the
 * bucket's lifetime. Refill is lazy and whole-second based: tokens are
 * topped up from the seconds elapsed since the last refill, capped at
 * capacity. Denials are counted per key in [`SyncMetrics`].
 */

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::metrics::SyncMetrics;

#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    refill_per_second: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, refill_per_second: f64) -> Self {
        Self {
            capacity: f64::from(capacity),
            refill_per_second,
            tokens: f64::from(capacity),
            last_refill: Instant::now(),
        }
    }

    fn try_consume(&mut self, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_refill).as_secs();
        if elapsed > 0 {
            self.tokens =
                (self.tokens + elapsed as f64 * self.refill_per_second).min(self.capacity);
            self.last_refill += Duration::from_secs(elapsed);
        }
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Shared limiter for all platform clients.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Arc<DashMap<String, TokenBucket>>,
    metrics: Arc<SyncMetrics>,
}

impl RateLimiter {
    pub fn new(metrics: Arc<SyncMetrics>) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            metrics,
        }
    }

    /// Attempts to take one token from `key`'s bucket.
    ///
    /// Returns `false` without blocking when the bucket is empty; the
    /// denial is logged and counted. `capacity`/`refill_per_second` only
    /// apply when this call creates the bucket.
    pub fn try_acquire(&self, key: &str, capacity: u32, refill_per_second: f64) -> bool {
        let now = Instant::now();
        let mut entry = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(capacity, refill_per_second));

        let allowed = entry.value_mut().try_consume(now);
        drop(entry);

        if !allowed {
            warn!("Rate limit exceeded for key={}", key);
            self.metrics.increment_rate_limited(key);
        }
        allowed
    }

    /// Drops buckets that have not refilled within `max_idle`. An evicted
    /// key restarts with a full bucket on its next acquire.
    pub fn purge_idle(&self, max_idle: Duration) {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.last_refill) < max_idle);
        let removed = before - self.buckets.len();
        if removed > 0 {
            debug!("Purged {} idle rate limiter bucket(s)", removed);
        }
    }

    /// Spawns a background task that periodically evicts idle buckets.
    pub fn start_cleanup_task(
        self: &Arc<Self>,
        interval: Duration,
        max_idle: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                limiter.purge_idle(max_idle);
            }
        })
    }

    #[cfg(test)]
    fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
