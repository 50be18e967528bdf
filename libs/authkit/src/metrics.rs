//! Observational hooks for the auth caches.
//!
//! Nothing in the caches depends on what a sink does with these calls.

use std::time::Duration;

/// Receives cache events. `cache` is the name the cache was built with.
pub trait CacheMetrics: Send + Sync + 'static {
    fn record_hit(&self, cache: &str);

    fn record_miss(&self, cache: &str);

    /// Latency of a whole lookup, including the load on a miss.
    fn record_get_latency(&self, cache: &str, latency: Duration);

    fn record_load(&self, cache: &str, latency: Duration, success: bool);

    fn record_size(&self, cache: &str, entries: u64);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCacheMetrics;

impl CacheMetrics for NoopCacheMetrics {
    fn record_hit(&self, _cache: &str) {}

    fn record_miss(&self, _cache: &str) {}

    fn record_get_latency(&self, _cache: &str, _latency: Duration) {}

    fn record_load(&self, _cache: &str, _latency: Duration, _success: bool) {}

    fn record_size(&self, _cache: &str, _entries: u64) {}
}

/// Emits every event as a `trace`-level tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCacheMetrics;

impl CacheMetrics for TracingCacheMetrics {
    fn record_hit(&self, cache: &str) {
        tracing::trace!(cache, "auth cache hit");
    }

    fn record_miss(&self, cache: &str) {
        tracing::trace!(cache, "auth cache miss");
    }

    fn record_get_latency(&self, cache: &str, latency: Duration) {
        tracing::trace!(cache, latency_us = latency.as_micros(), "auth cache get");
    }

    fn record_load(&self, cache: &str, latency: Duration, success: bool) {
        tracing::trace!(
            cache,
            latency_us = latency.as_micros(),
            success,
            "auth cache load"
        );
    }

    fn record_size(&self, cache: &str, entries: u64) {
        tracing::trace!(cache, entries, "auth cache size");
    }
}
