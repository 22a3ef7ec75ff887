/*!
 * Integration metrics for the propagation pipeline.
 *
 * A [`SyncMetrics`] instance is constructed once at startup and shared
 * via `Arc` with the rate limiter, the retry executor, and anything that
 * wants a snapshot. There is no global registry; everything that counts
 * holds a handle.
 */

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Monotonic counter. Cloning shares the underlying value.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of the integration counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub rate_limited_by_key: BTreeMap<String, u64>,
    pub retries_attempted: u64,
    pub retries_failed: u64,
}

/// Counters shared by the rate limiter and the retry executor.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    rate_limited: DashMap<String, Counter>,
    retries_attempted: Counter,
    retries_failed: Counter,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one token-bucket denial for `key`.
    pub fn increment_rate_limited(&self, key: &str) {
        self.rate_limited
            .entry(key.to_string())
            .or_insert_with(Counter::new)
            .increment();
    }

    /// Counts one operation that succeeded only after re-attempts.
    pub fn increment_retries_attempted(&self) {
        self.retries_attempted.increment();
    }

    /// Counts one operation that spent its whole retry budget.
    pub fn increment_retries_failed(&self) {
        self.retries_failed.increment();
    }

    pub fn rate_limited_count(&self, key: &str) -> u64 {
        self.rate_limited.get(key).map(|c| c.get()).unwrap_or(0)
    }

    pub fn retries_attempted_count(&self) -> u64 {
        self.retries_attempted.get()
    }

    pub fn retries_failed_count(&self) -> u64 {
        self.retries_failed.get()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let rate_limited_by_key = self
            .rate_limited
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().get()))
            .collect();
        MetricsSnapshot {
            rate_limited_by_key,
            retries_attempted: self.retries_attempted.get(),
            retries_failed: self.retries_failed.get(),
        }
    }

    /// Renders the counters in Prometheus text exposition format.
    pub fn export_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut output = String::new();

        output.push_str("# HELP sync_rate_limited_total Rate limiter denials per key\n");
        output.push_str("# TYPE sync_rate_limited_total counter\n");
        for (key, value) in &snapshot.rate_limited_by_key {
            output.push_str(&format!(
                "sync_rate_limited_total{{key=\"{}\"}} {}\n",
                key, value
            ));
        }

        output.push_str("# HELP sync_retries_attempted_total Operations that needed re-attempts before succeeding\n");
        output.push_str("# TYPE sync_retries_attempted_total counter\n");
        output.push_str(&format!(
            "sync_retries_attempted_total {}\n",
            snapshot.retries_attempted
        ));

        output.push_str("# HELP sync_retries_failed_total Operations that exhausted their retry budget\n");
        output.push_str("# TYPE sync_retries_failed_total counter\n");
        output.push_str(&format!(
            "sync_retries_failed_total {}\n",
            snapshot.retries_failed
        ));

        output
    }
}
