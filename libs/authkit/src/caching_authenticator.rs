//! Look-aside cache in front of an [`Authenticator`].
//!
//! Only successful authentications are stored. A credential that matched
//! nobody, or whose verification failed, reaches the wrapped authenticator
//! again on the next request, so neither a probed password nor a transient
//! backend outage is remembered.
//!
//! Concurrent misses for the same credentials may each call the wrapped
//! authenticator; the last writer wins, which is harmless because the
//! stored principal is the same for a given key.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use moka::future::Cache;

use crate::authenticator::Authenticator;
use crate::cache::{CacheSpec, CacheStats, StatsCounter};
use crate::errors::AuthenticationError;
use crate::metrics::{CacheMetrics, NoopCacheMetrics};

/// Cache name reported to [`CacheMetrics`].
pub const AUTHENTICATION_CACHE: &str = "authentication";

pub struct CachingAuthenticator<C, P> {
    inner: Arc<dyn Authenticator<C, P>>,
    cache: Cache<C, P>,
    stats: Arc<StatsCounter>,
    metrics: Arc<dyn CacheMetrics>,
}

impl<C, P> CachingAuthenticator<C, P>
where
    C: Clone + Eq + Hash + Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(inner: impl Authenticator<C, P> + 'static, spec: &CacheSpec) -> Self {
        Self::from_arc(Arc::new(inner), spec)
    }

    #[must_use]
    pub fn from_arc(inner: Arc<dyn Authenticator<C, P>>, spec: &CacheSpec) -> Self {
        let stats = Arc::new(StatsCounter::default());
        Self {
            inner,
            cache: spec.build(AUTHENTICATION_CACHE, stats.clone()),
            stats,
            metrics: Arc::new(NoopCacheMetrics),
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Drop the cached principal for `credentials`.
    pub async fn invalidate(&self, credentials: &C) {
        self.cache.invalidate(credentials).await;
    }

    /// Drop the cached principals for every credential in `keys`.
    pub async fn invalidate_keys<I>(&self, keys: I)
    where
        I: IntoIterator<Item = C>,
    {
        for key in keys {
            self.cache.invalidate(&key).await;
        }
    }

    /// Drop every cached entry whose credentials satisfy `predicate`.
    pub async fn invalidate_matching<F>(&self, predicate: F)
    where
        F: Fn(&C) -> bool,
    {
        let doomed: Vec<Arc<C>> = self
            .cache
            .iter()
            .filter_map(|(key, _)| predicate(key.as_ref()).then_some(key))
            .collect();
        for key in doomed {
            self.cache.invalidate(key.as_ref()).await;
        }
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Number of cached principals, after pending maintenance has run.
    pub async fn size(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        let entries = self.cache.entry_count();
        self.metrics.record_size(AUTHENTICATION_CACHE, entries);
        entries
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }
}

#[async_trait]
impl<C, P> Authenticator<C, P> for CachingAuthenticator<C, P>
where
    C: Clone + Eq + Hash + Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    async fn authenticate(&self, credentials: &C) -> Result<Option<P>, AuthenticationError> {
        let started = Instant::now();

        if let Some(principal) = self.cache.get(credentials).await {
            self.stats.record_hit();
            self.metrics.record_hit(AUTHENTICATION_CACHE);
            self.metrics
                .record_get_latency(AUTHENTICATION_CACHE, started.elapsed());
            return Ok(Some(principal));
        }

        self.stats.record_miss();
        self.metrics.record_miss(AUTHENTICATION_CACHE);

        let result = self.inner.authenticate(credentials).await;
        let elapsed = started.elapsed();
        self.stats.record_load(elapsed, result.is_ok());
        self.metrics
            .record_load(AUTHENTICATION_CACHE, elapsed, result.is_ok());

        if let Ok(Some(principal)) = &result {
            self.cache
                .insert(credentials.clone(), principal.clone())
                .await;
        }

        self.metrics
            .record_get_latency(AUTHENTICATION_CACHE, started.elapsed());
        result
    }
}
