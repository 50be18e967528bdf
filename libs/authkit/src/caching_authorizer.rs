//! Loading cache in front of an [`Authorizer`].
//!
//! Unlike [`CachingAuthenticator`](crate::CachingAuthenticator), both allow
//! and deny decisions are stored: role membership is expected to change
//! rarely, and callers invalidate explicitly when it does. A miss runs the
//! wrapped authorizer once; concurrent misses for the same key wait for that
//! single load. The request context is not part of the key.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use moka::future::Cache;

use crate::authorizer::Authorizer;
use crate::cache::{CacheSpec, CacheStats, StatsCounter};
use crate::errors::AuthorizationError;
use crate::metrics::{CacheMetrics, NoopCacheMetrics};
use crate::request::RequestHead;

/// Cache name reported to [`CacheMetrics`].
pub const AUTHORIZATION_CACHE: &str = "authorization";

/// `(principal, role)`; equality and hash are structural over both fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthorizationKey<P> {
    pub principal: P,
    pub role: String,
}

impl<P> AuthorizationKey<P> {
    #[must_use]
    pub fn new(principal: P, role: impl Into<String>) -> Self {
        Self {
            principal,
            role: role.into(),
        }
    }
}

pub struct CachingAuthorizer<P> {
    inner: Arc<dyn Authorizer<P>>,
    cache: Cache<AuthorizationKey<P>, bool>,
    stats: Arc<StatsCounter>,
    metrics: Arc<dyn CacheMetrics>,
}

impl<P> CachingAuthorizer<P>
where
    P: Clone + Eq + Hash + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(inner: impl Authorizer<P> + 'static, spec: &CacheSpec) -> Self {
        Self::from_arc(Arc::new(inner), spec)
    }

    #[must_use]
    pub fn from_arc(inner: Arc<dyn Authorizer<P>>, spec: &CacheSpec) -> Self {
        let stats = Arc::new(StatsCounter::default());
        Self {
            inner,
            cache: spec.build(AUTHORIZATION_CACHE, stats.clone()),
            stats,
            metrics: Arc::new(NoopCacheMetrics),
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Drop the cached decision for one `(principal, role)` pair.
    pub async fn invalidate(&self, principal: &P, role: &str) {
        self.cache
            .invalidate(&AuthorizationKey::new(principal.clone(), role))
            .await;
    }

    /// Drop every cached role decision for `principal`.
    pub async fn invalidate_principal(&self, principal: &P) {
        self.invalidate_matching(|p, _| p == principal).await;
    }

    /// Drop every cached role decision for each of `principals`.
    pub async fn invalidate_principals<I>(&self, principals: I)
    where
        I: IntoIterator<Item = P>,
    {
        let principals: HashSet<P> = principals.into_iter().collect();
        if principals.is_empty() {
            return;
        }
        self.invalidate_matching(|p, _| principals.contains(p)).await;
    }

    /// Drop every cached decision whose key satisfies `predicate`.
    pub async fn invalidate_matching<F>(&self, predicate: F)
    where
        F: Fn(&P, &str) -> bool,
    {
        let doomed: Vec<Arc<AuthorizationKey<P>>> = self
            .cache
            .iter()
            .filter_map(|(key, _)| predicate(&key.principal, &key.role).then_some(key))
            .collect();
        for key in doomed {
            self.cache.invalidate(key.as_ref()).await;
        }
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Number of cached decisions, after pending maintenance has run.
    pub async fn size(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        let entries = self.cache.entry_count();
        self.metrics.record_size(AUTHORIZATION_CACHE, entries);
        entries
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    async fn load(
        &self,
        principal: &P,
        role: &str,
        request: Option<&RequestHead<'_>>,
    ) -> Result<bool, AuthorizationError> {
        let started = Instant::now();
        let result = self.inner.authorize(principal, role, request).await;
        let elapsed = started.elapsed();
        self.stats.record_load(elapsed, result.is_ok());
        self.metrics
            .record_load(AUTHORIZATION_CACHE, elapsed, result.is_ok());
        result
    }
}

#[async_trait]
impl<P> Authorizer<P> for CachingAuthorizer<P>
where
    P: Clone + Eq + Hash + Send + Sync + 'static,
{
    async fn authorize(
        &self,
        principal: &P,
        role: &str,
        request: Option<&RequestHead<'_>>,
    ) -> Result<bool, AuthorizationError> {
        let started = Instant::now();
        let key = AuthorizationKey::new(principal.clone(), role);

        let outcome = self
            .cache
            .entry(key)
            .or_try_insert_with(self.load(principal, role, request))
            .await;

        let result = match outcome {
            Ok(entry) => {
                if entry.is_fresh() {
                    self.stats.record_miss();
                    self.metrics.record_miss(AUTHORIZATION_CACHE);
                } else {
                    self.stats.record_hit();
                    self.metrics.record_hit(AUTHORIZATION_CACHE);
                }
                Ok(entry.into_value())
            }
            Err(err) => {
                self.stats.record_miss();
                self.metrics.record_miss(AUTHORIZATION_CACHE);
                // Hand back the authorizer's own error, not moka's shared wrapper
                Err(Arc::unwrap_or_clone(err))
            }
        };

        self.metrics
            .record_get_latency(AUTHORIZATION_CACHE, started.elapsed());
        result
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use authkit_security::{BasicPrincipal, Principal};

    use super::*;

    /// Mutable role assignments so tests can change membership behind the cache.
    #[derive(Default)]
    struct RoleTable(Mutex<HashMap<String, Vec<String>>>);

    impl RoleTable {
        fn grant(&self, user: &str, role: &str) {
            self.0
                .lock()
                .unwrap()
                .entry(user.to_owned())
                .or_default()
                .push(role.to_owned());
        }

        fn revoke_all(&self, user: &str) {
            self.0.lock().unwrap().remove(user);
        }

        fn has(&self, user: &str, role: &str) -> bool {
            self.0
                .lock()
                .unwrap()
                .get(user)
                .is_some_and(|roles| roles.iter().any(|r| r == role))
        }
    }

    #[derive(Default)]
    struct CountingAuthorizer {
        calls: AtomicUsize,
        roles: RoleTable,
        failures: HashMap<String, AuthorizationError>,
    }

    #[async_trait]
    impl Authorizer<BasicPrincipal> for CountingAuthorizer {
        async fn authorize(
            &self,
            principal: &BasicPrincipal,
            role: &str,
            _request: Option<&RequestHead<'_>>,
        ) -> Result<bool, AuthorizationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.failures.get(principal.name()) {
                return Err(err.clone());
            }
            Ok(self.roles.has(principal.name(), role))
        }
    }

    fn calls(inner: &CountingAuthorizer) -> usize {
        inner.calls.load(Ordering::SeqCst)
    }

    fn cached(inner: &Arc<CountingAuthorizer>) -> CachingAuthorizer<BasicPrincipal> {
        CachingAuthorizer::from_arc(inner.clone(), &CacheSpec::default())
    }

    #[tokio::test]
    async fn decisions_are_cached_until_invalidated() {
        let inner = Arc::new(CountingAuthorizer::default());
        inner.roles.grant("good-guy", "ADMIN");
        let authz = cached(&inner);
        let p = BasicPrincipal::new("good-guy");

        assert!(authz.authorize(&p, "ADMIN", None).await.unwrap());
        assert!(authz.authorize(&p, "ADMIN", None).await.unwrap());
        assert_eq!(calls(&inner), 1);

        // Membership changes are invisible until the entry is invalidated
        inner.roles.revoke_all("good-guy");
        assert!(authz.authorize(&p, "ADMIN", None).await.unwrap());

        authz.invalidate(&p, "ADMIN").await;
        assert!(!authz.authorize(&p, "ADMIN", None).await.unwrap());
        assert_eq!(calls(&inner), 2);

        let stats = authz.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
    }

    #[tokio::test]
    async fn expired_decision_is_reloaded() {
        let inner = Arc::new(CountingAuthorizer::default());
        inner.roles.grant("good-guy", "ADMIN");
        let spec = CacheSpec::default().expire_after_write(Duration::from_millis(50));
        let authz = CachingAuthorizer::from_arc(inner.clone(), &spec);
        let p = BasicPrincipal::new("good-guy");

        assert!(authz.authorize(&p, "ADMIN", None).await.unwrap());
        inner.roles.revoke_all("good-guy");
        assert!(authz.authorize(&p, "ADMIN", None).await.unwrap());
        assert_eq!(calls(&inner), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!authz.authorize(&p, "ADMIN", None).await.unwrap());
        assert_eq!(calls(&inner), 2);
    }

    #[tokio::test]
    async fn deny_is_cached_too() {
        let inner = Arc::new(CountingAuthorizer::default());
        let authz = cached(&inner);
        let p = BasicPrincipal::new("ordinary-guy");

        assert!(!authz.authorize(&p, "ADMIN", None).await.unwrap());
        assert!(!authz.authorize(&p, "ADMIN", None).await.unwrap());

        assert_eq!(calls(&inner), 1);
    }

    #[tokio::test]
    async fn roles_are_separate_keys() {
        let inner = Arc::new(CountingAuthorizer::default());
        inner.roles.grant("good-guy", "USER");
        let authz = cached(&inner);
        let p = BasicPrincipal::new("good-guy");

        assert!(authz.authorize(&p, "USER", None).await.unwrap());
        assert!(!authz.authorize(&p, "ADMIN", None).await.unwrap());

        assert_eq!(calls(&inner), 2);
        assert_eq!(authz.size().await, 2);
    }

    #[tokio::test]
    async fn errors_propagate_unwrapped_and_are_not_cached() {
        let mut inner = CountingAuthorizer::default();
        inner.failures.insert(
            "flaky".to_owned(),
            AuthorizationError::Unavailable("policy store".to_owned()),
        );
        let inner = Arc::new(inner);
        let authz = cached(&inner);
        let p = BasicPrincipal::new("flaky");

        let err = authz.authorize(&p, "ADMIN", None).await.unwrap_err();
        assert_eq!(err, AuthorizationError::Unavailable("policy store".to_owned()));

        assert!(authz.authorize(&p, "ADMIN", None).await.is_err());
        assert_eq!(calls(&inner), 2);
        assert_eq!(authz.size().await, 0);
        assert_eq!(authz.stats().load_failures, 2);
    }

    #[tokio::test]
    async fn invalidate_principal_drops_all_roles() {
        let inner = Arc::new(CountingAuthorizer::default());
        let authz = cached(&inner);
        let a = BasicPrincipal::new("a");
        let b = BasicPrincipal::new("b");

        for role in ["R1", "R2", "R3"] {
            authz.authorize(&a, role, None).await.unwrap();
        }
        authz.authorize(&b, "R1", None).await.unwrap();
        assert_eq!(authz.size().await, 4);

        authz.invalidate_principal(&a).await;
        assert_eq!(authz.size().await, 1);
    }

    #[tokio::test]
    async fn invalidate_principals_and_predicate() {
        let inner = Arc::new(CountingAuthorizer::default());
        let authz = cached(&inner);
        let names = ["a", "b", "c", "d"];

        for name in names {
            let p = BasicPrincipal::new(name);
            authz.authorize(&p, "READ", None).await.unwrap();
            authz.authorize(&p, "WRITE", None).await.unwrap();
        }
        assert_eq!(authz.size().await, 8);

        authz
            .invalidate_principals([BasicPrincipal::new("a"), BasicPrincipal::new("b")])
            .await;
        assert_eq!(authz.size().await, 4);

        authz.invalidate_matching(|_, role| role == "WRITE").await;
        assert_eq!(authz.size().await, 2);

        authz.invalidate_all();
        assert_eq!(authz.size().await, 0);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_load() {
        let inner = Arc::new(CountingAuthorizer::default());
        inner.roles.grant("good-guy", "ADMIN");
        let authz = Arc::new(cached(&inner));

        let lookups = (0..8).map(|_| {
            let authz = authz.clone();
            async move {
                authz
                    .authorize(&BasicPrincipal::new("good-guy"), "ADMIN", None)
                    .await
            }
        });
        let results = futures::future::join_all(lookups).await;

        assert!(results.into_iter().all(|r| r == Ok(true)));
        assert_eq!(calls(&inner), 1);
    }

    #[test]
    fn key_equality_is_structural() {
        let k1 = AuthorizationKey::new(BasicPrincipal::new("a"), "ADMIN");
        let k2 = AuthorizationKey::new(BasicPrincipal::new("a"), "ADMIN".to_owned());
        let k3 = AuthorizationKey::new(BasicPrincipal::new("a"), "USER");

        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }
}
