//! Cache policy and statistics shared by the auth caches.
//!
//! A [`CacheSpec`] is written either as a compact string
//!
//! ```text
//! maximumSize=10000, expireAfterAccess=10m, expireAfterWrite=1h
//! ```
//!
//! or as a map with humantime durations:
//!
//! ```yaml
//! maximum_size: 10000
//! expire_after_access: 10m
//! ```
//!
//! Any dimension left unset is unbounded.

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use serde::Deserialize;

use crate::errors::ConfigError;

/// Longest expiration moka accepts (1000 years of 365 days).
pub const MAX_EXPIRY: Duration = Duration::from_secs(1000 * 365 * 24 * 3600);

/// Upper bound for `initial_capacity`; capacity is allocated up front.
pub const MAX_INITIAL_CAPACITY: usize = 1 << 20;

/// Bounds and expiration policy for an auth cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheSpec {
    pub initial_capacity: Option<usize>,
    pub maximum_size: Option<u64>,
    pub expire_after_write: Option<Duration>,
    pub expire_after_access: Option<Duration>,
}

impl CacheSpec {
    #[must_use]
    pub fn maximum_size(mut self, entries: u64) -> Self {
        self.maximum_size = Some(entries);
        self
    }

    #[must_use]
    pub fn expire_after_write(mut self, ttl: Duration) -> Self {
        self.expire_after_write = Some(ttl);
        self
    }

    #[must_use]
    pub fn expire_after_access(mut self, tti: Duration) -> Self {
        self.expire_after_access = Some(tti);
        self
    }

    /// # Errors
    ///
    /// [`ConfigError::InvalidCacheSpec`] when an expiration exceeds
    /// [`MAX_EXPIRY`] or the initial capacity exceeds [`MAX_INITIAL_CAPACITY`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.check_bounds(&self.to_string())
    }

    fn check_bounds(&self, spec: &str) -> Result<(), ConfigError> {
        if self.initial_capacity.is_some_and(|c| c > MAX_INITIAL_CAPACITY) {
            return Err(invalid(
                spec,
                format!("initialCapacity exceeds {MAX_INITIAL_CAPACITY}"),
            ));
        }
        for (key, expiry) in [
            ("expireAfterWrite", self.expire_after_write),
            ("expireAfterAccess", self.expire_after_access),
        ] {
            if expiry.is_some_and(|d| d > MAX_EXPIRY) {
                return Err(invalid(spec, format!("{key} exceeds 1000 years")));
            }
        }
        Ok(())
    }

    /// Build a moka cache honouring this spec. Size and expiry removals are
    /// counted as evictions in `stats`; explicit invalidation is not.
    /// Out-of-range values are clamped to the limits [`CacheSpec::validate`]
    /// enforces.
    pub(crate) fn build<K, V>(&self, name: &str, stats: Arc<StatsCounter>) -> Cache<K, V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let mut builder = Cache::builder().name(name);
        if let Some(capacity) = self.initial_capacity {
            builder = builder.initial_capacity(capacity.min(MAX_INITIAL_CAPACITY));
        }
        if let Some(max) = self.maximum_size {
            builder = builder.max_capacity(max);
        }
        if let Some(ttl) = self.expire_after_write {
            builder = builder.time_to_live(ttl.min(MAX_EXPIRY));
        }
        if let Some(tti) = self.expire_after_access {
            builder = builder.time_to_idle(tti.min(MAX_EXPIRY));
        }
        builder
            .eviction_listener(move |_key, _value, cause| {
                if cause.was_evicted() {
                    stats.record_eviction();
                }
            })
            .build()
    }
}

fn invalid(spec: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidCacheSpec {
        spec: spec.to_owned(),
        reason: reason.into(),
    }
}

/// Parses `<n><unit>` with unit one of `d`, `h`, `m`, `s`, `ms`.
fn parse_spec_duration(spec: &str, key: &str, value: &str) -> Result<Duration, ConfigError> {
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| invalid(spec, format!("{key} requires a time unit")))?;
    let (amount, unit) = value.split_at(split);
    let amount: u64 = amount
        .parse()
        .map_err(|_| invalid(spec, format!("{key} has an invalid amount '{value}'")))?;
    let duration = match unit {
        "d" => amount.checked_mul(86_400).map(Duration::from_secs),
        "h" => amount.checked_mul(3_600).map(Duration::from_secs),
        "m" => amount.checked_mul(60).map(Duration::from_secs),
        "s" => Some(Duration::from_secs(amount)),
        "ms" => Some(Duration::from_millis(amount)),
        other => return Err(invalid(spec, format!("{key} has an unknown unit '{other}'"))),
    };
    duration.ok_or_else(|| invalid(spec, format!("{key} is out of range '{value}'")))
}

impl FromStr for CacheSpec {
    type Err = ConfigError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut parsed = Self::default();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, value) = entry
                .split_once('=')
                .map_or((entry, None), |(k, v)| (k.trim(), Some(v.trim())));

            match (key, value) {
                ("recordStats", None) => {}
                ("initialCapacity", Some(v)) => {
                    if parsed.initial_capacity.is_some() {
                        return Err(invalid(spec, "initialCapacity was already set"));
                    }
                    parsed.initial_capacity = Some(v.parse().map_err(|_| {
                        invalid(spec, format!("initialCapacity has an invalid value '{v}'"))
                    })?);
                }
                ("maximumSize", Some(v)) => {
                    if parsed.maximum_size.is_some() {
                        return Err(invalid(spec, "maximumSize was already set"));
                    }
                    parsed.maximum_size = Some(v.parse().map_err(|_| {
                        invalid(spec, format!("maximumSize has an invalid value '{v}'"))
                    })?);
                }
                ("expireAfterWrite", Some(v)) => {
                    if parsed.expire_after_write.is_some() {
                        return Err(invalid(spec, "expireAfterWrite was already set"));
                    }
                    parsed.expire_after_write = Some(parse_spec_duration(spec, key, v)?);
                }
                ("expireAfterAccess", Some(v)) => {
                    if parsed.expire_after_access.is_some() {
                        return Err(invalid(spec, "expireAfterAccess was already set"));
                    }
                    parsed.expire_after_access = Some(parse_spec_duration(spec, key, v)?);
                }
                (key, _) => {
                    return Err(invalid(spec, format!("unsupported or malformed key '{key}'")));
                }
            }
        }
        parsed.check_bounds(spec)?;
        Ok(parsed)
    }
}

impl fmt::Display for CacheSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(capacity) = self.initial_capacity {
            parts.push(format!("initialCapacity={capacity}"));
        }
        if let Some(max) = self.maximum_size {
            parts.push(format!("maximumSize={max}"));
        }
        if let Some(ttl) = self.expire_after_write {
            parts.push(format!("expireAfterWrite={}ms", ttl.as_millis()));
        }
        if let Some(tti) = self.expire_after_access {
            parts.push(format!("expireAfterAccess={}ms", tti.as_millis()));
        }
        f.write_str(&parts.join(","))
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CacheSpecFields {
    #[serde(default)]
    initial_capacity: Option<usize>,
    #[serde(default)]
    maximum_size: Option<u64>,
    #[serde(default, with = "humantime_opt")]
    expire_after_write: Option<Duration>,
    #[serde(default, with = "humantime_opt")]
    expire_after_access: Option<Duration>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CacheSpecRepr {
    Compact(String),
    Fields(CacheSpecFields),
}

impl<'de> Deserialize<'de> for CacheSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match CacheSpecRepr::deserialize(deserializer)? {
            CacheSpecRepr::Compact(spec) => spec.parse().map_err(serde::de::Error::custom),
            CacheSpecRepr::Fields(fields) => {
                let spec = Self {
                    initial_capacity: fields.initial_capacity,
                    maximum_size: fields.maximum_size,
                    expire_after_write: fields.expire_after_write,
                    expire_after_access: fields.expire_after_access,
                };
                spec.validate().map_err(serde::de::Error::custom)?;
                Ok(spec)
            }
        }
    }
}

mod humantime_opt {
    use std::time::Duration;

    use serde::Deserialize;

    pub(super) fn deserialize<'de, D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Lock-free counters behind [`CacheStats`].
///
/// All operations use `Relaxed`: counters are independent and only read for
/// reporting.
#[derive(Debug, Default)]
pub(crate) struct StatsCounter {
    hits: AtomicU64,
    misses: AtomicU64,
    load_successes: AtomicU64,
    load_failures: AtomicU64,
    evictions: AtomicU64,
    total_load_time_ns: AtomicU64,
}

impl StatsCounter {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load(&self, elapsed: Duration, success: bool) {
        if success {
            self.load_successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.load_failures.fetch_add(1, Ordering::Relaxed);
        }
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.total_load_time_ns.fetch_add(nanos, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            load_successes: self.load_successes.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            total_load_time: Duration::from_nanos(self.total_load_time_ns.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Loads whose result was a value (stored or not, depending on the cache).
    pub load_successes: u64,
    pub load_failures: u64,
    /// Entries removed for size or expiry. Explicit invalidation is excluded.
    pub evictions: u64,
    pub total_load_time: Duration,
}

impl CacheStats {
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.hits + self.misses
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        match self.request_count() {
            0 => 1.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn parses_compact_spec() {
        let spec: CacheSpec = "maximumSize=10000, expireAfterAccess=10m, expireAfterWrite=1h"
            .parse()
            .unwrap();

        assert_eq!(spec.maximum_size, Some(10_000));
        assert_eq!(spec.expire_after_access, Some(Duration::from_secs(600)));
        assert_eq!(spec.expire_after_write, Some(Duration::from_secs(3_600)));
        assert_eq!(spec.initial_capacity, None);
    }

    #[test]
    fn empty_spec_is_unbounded() {
        assert_eq!("".parse::<CacheSpec>().unwrap(), CacheSpec::default());
    }

    #[test]
    fn parses_all_units_and_flags() {
        let spec: CacheSpec = "recordStats,initialCapacity=16,expireAfterWrite=2d,expireAfterAccess=250ms"
            .parse()
            .unwrap();

        assert_eq!(spec.initial_capacity, Some(16));
        assert_eq!(spec.expire_after_write, Some(Duration::from_secs(172_800)));
        assert_eq!(spec.expire_after_access, Some(Duration::from_millis(250)));
    }

    #[test]
    fn rejects_bad_specs() {
        for bad in [
            "maximumSize=lots",
            "maximumSize=1,maximumSize=2",
            "expireAfterWrite=10",
            "expireAfterWrite=10w",
            "expireAfterWrite=m",
            "weakKeys",
            "softValues=true",
            "maximumSize",
        ] {
            let err = bad.parse::<CacheSpec>().unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidCacheSpec { .. }),
                "{bad} -> {err:?}"
            );
        }
    }

    #[test]
    fn rejects_out_of_range_values() {
        for bad in [
            "expireAfterWrite=300000000000000d",
            "expireAfterWrite=400000d",
            "expireAfterAccess=9000000h",
            "initialCapacity=100000000000",
        ] {
            let err = bad.parse::<CacheSpec>().unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidCacheSpec { .. }),
                "{bad} -> {err:?}"
            );
        }

        assert!("expireAfterWrite=365000d".parse::<CacheSpec>().is_ok());
    }

    #[test]
    fn map_form_rejects_out_of_range_values() {
        let too_long: Result<CacheSpec, _> = serde_json::from_value(serde_json::json!({
            "expire_after_write": "2000years",
        }));
        let too_big: Result<CacheSpec, _> = serde_json::from_value(serde_json::json!({
            "initial_capacity": 100_000_000_000_u64,
        }));

        assert!(too_long.is_err());
        assert!(too_big.is_err());
    }

    #[tokio::test]
    async fn build_clamps_values_set_in_code() {
        let spec = CacheSpec {
            initial_capacity: Some(usize::MAX),
            maximum_size: Some(10),
            expire_after_write: Some(Duration::from_secs(u64::MAX)),
            expire_after_access: Some(Duration::from_secs(u64::MAX)),
        };
        assert!(spec.validate().is_err());

        let cache: Cache<u32, u32> = spec.build("clamped", Arc::new(StatsCounter::default()));
        cache.insert(1, 1).await;
        assert_eq!(cache.get(&1).await, Some(1));
    }

    #[test]
    fn display_round_trips() {
        let spec = CacheSpec::default()
            .maximum_size(5)
            .expire_after_write(Duration::from_secs(2));
        let again: CacheSpec = spec.to_string().parse().unwrap();
        assert_eq!(again, spec);
    }

    #[test]
    fn deserializes_from_string_or_map() {
        let from_str: CacheSpec =
            serde_json::from_value(serde_json::json!("maximumSize=3,expireAfterWrite=5s")).unwrap();
        let from_map: CacheSpec = serde_json::from_value(serde_json::json!({
            "maximum_size": 3,
            "expire_after_write": "5s",
        }))
        .unwrap();

        assert_eq!(from_str, from_map);
    }

    #[test]
    fn deserialize_rejects_invalid_compact_spec() {
        let result: Result<CacheSpec, _> =
            serde_json::from_value(serde_json::json!("maximumSize=-1"));
        assert!(result.is_err());
    }

    #[test]
    fn hit_rate_of_unused_cache_is_one() {
        let stats = CacheStats::default();
        assert_eq!(stats.request_count(), 0);
        assert!((stats.hit_rate() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn counter_snapshot_reflects_records() {
        let counter = StatsCounter::default();
        counter.record_hit();
        counter.record_miss();
        counter.record_miss();
        counter.record_load(Duration::from_millis(3), true);
        counter.record_load(Duration::from_millis(1), false);
        counter.record_eviction();

        let stats = counter.snapshot();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.load_successes, 1);
        assert_eq!(stats.load_failures, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.total_load_time, Duration::from_millis(4));
    }
}
