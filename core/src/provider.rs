//! Rule and dealer-config providers, plus TTL caching decorators.
//!
//! RULE: caching lives here, around a provider, never inside the calculator.
//! Callers get an owned `Arc` snapshot per request, so a refresh that lands
//! mid-request cannot change the data that request is pricing against.

use crate::{
    dealer::DealerConfig,
    error::EngineResult,
    rule::JurisdictionRule,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_RULE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_DEALER_TTL: Duration = Duration::from_secs(10 * 60);

/// Candidate rules for a location. The engine re-filters by location and date.
pub trait RuleProvider: Send + Sync {
    fn rules_for(
        &self,
        state_code: &str,
        county_name: Option<&str>,
    ) -> EngineResult<Arc<Vec<JurisdictionRule>>>;
}

pub trait DealerConfigProvider: Send + Sync {
    fn dealer_config(&self, dealer_id: &str) -> EngineResult<Arc<DealerConfig>>;
}

struct CacheEntry<T> {
    loaded_at: Instant,
    value:     Arc<T>,
}

/// Keyed TTL cache shared by both decorators.
struct TtlCache<K, T> {
    ttl:     Duration,
    entries: Mutex<HashMap<K, CacheEntry<T>>>,
}

impl<K: std::hash::Hash + Eq, T> TtlCache<K, T> {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get_or_load(
        &self,
        key: K,
        load: impl FnOnce() -> EngineResult<Arc<T>>,
    ) -> EngineResult<Arc<T>> {
        {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = entries.get(&key) {
                if entry.loaded_at.elapsed() < self.ttl {
                    return Ok(Arc::clone(&entry.value));
                }
            }
        }

        // Load outside the lock; a concurrent miss may load twice, last write wins.
        let value = load()?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.loaded_at.elapsed() < ttl);
        entries.insert(
            key,
            CacheEntry {
                loaded_at: Instant::now(),
                value:     Arc::clone(&value),
            },
        );
        Ok(value)
    }

    fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

pub struct CachedRuleProvider<P> {
    inner: P,
    cache: TtlCache<(String, Option<String>), Vec<JurisdictionRule>>,
}

impl<P: RuleProvider> CachedRuleProvider<P> {
    pub fn new(inner: P) -> Self {
        Self::with_ttl(inner, DEFAULT_RULE_TTL)
    }

    pub fn with_ttl(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl),
        }
    }

    /// Drop every cached snapshot; the next lookup reloads.
    pub fn invalidate(&self) {
        self.cache.clear();
        log::debug!("provider: rule cache invalidated");
    }
}

impl<P: RuleProvider> RuleProvider for CachedRuleProvider<P> {
    fn rules_for(
        &self,
        state_code: &str,
        county_name: Option<&str>,
    ) -> EngineResult<Arc<Vec<JurisdictionRule>>> {
        let key = (
            state_code.trim().to_ascii_uppercase(),
            county_name.map(|c| c.trim().to_ascii_lowercase()),
        );
        self.cache.get_or_load(key, || {
            log::debug!("provider: loading rules for {state_code}/{}", county_name.unwrap_or("*"));
            self.inner.rules_for(state_code, county_name)
        })
    }
}

pub struct CachedDealerConfigProvider<P> {
    inner: P,
    cache: TtlCache<String, DealerConfig>,
}

impl<P: DealerConfigProvider> CachedDealerConfigProvider<P> {
    pub fn new(inner: P) -> Self {
        Self::with_ttl(inner, DEFAULT_DEALER_TTL)
    }

    pub fn with_ttl(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl),
        }
    }

    pub fn invalidate(&self) {
        self.cache.clear();
        log::debug!("provider: dealer cache invalidated");
    }
}

impl<P: DealerConfigProvider> DealerConfigProvider for CachedDealerConfigProvider<P> {
    fn dealer_config(&self, dealer_id: &str) -> EngineResult<Arc<DealerConfig>> {
        self.cache.get_or_load(dealer_id.to_string(), || {
            log::debug!("provider: loading dealer config {dealer_id}");
            self.inner.dealer_config(dealer_id)
        })
    }
}

impl<P: RuleProvider + ?Sized> RuleProvider for Arc<P> {
    fn rules_for(
        &self,
        state_code: &str,
        county_name: Option<&str>,
    ) -> EngineResult<Arc<Vec<JurisdictionRule>>> {
        (**self).rules_for(state_code, county_name)
    }
}

impl<P: DealerConfigProvider + ?Sized> DealerConfigProvider for Arc<P> {
    fn dealer_config(&self, dealer_id: &str) -> EngineResult<Arc<DealerConfig>> {
        (**self).dealer_config(dealer_id)
    }
}
