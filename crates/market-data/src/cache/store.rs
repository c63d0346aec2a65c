//! Keyed TTL cache store.
//!
//! Wraps a durable [`CacheBackend`] with per-category TTL policy, payload
//! envelopes and hit/miss statistics. Backend faults are caught here and
//! degrade to a functional miss or no-op - the system stays correct (if
//! slower) with caching fully disabled.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::backend::CacheBackend;
use crate::config::CacheConfig;

/// Data category a cache entry belongs to; selects the TTL.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    /// Point-in-time quotes
    Quote,
    /// Historical price series
    Historical,
    /// Fundamental ratios
    Fundamentals,
    /// Financial statement tables
    Statements,
    /// Symbol search results
    Search,
    /// Company profiles
    Profile,
}

impl CacheCategory {
    /// Stable string form, used in cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Historical => "historical",
            Self::Fundamentals => "fundamentals",
            Self::Statements => "statements",
            Self::Search => "search",
            Self::Profile => "profile",
        }
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope persisted around every payload.
///
/// The stamp exists for observability; expiry itself is the backend's job.
#[derive(Debug, Serialize, Deserialize)]
struct CachedEnvelope<T> {
    cached_at: DateTime<Utc>,
    ttl_seconds: u64,
    payload: T,
}

/// Monotonic cache counters.
#[derive(Clone, Debug, Serialize)]
pub struct CacheStats {
    /// Lookups that found an unexpired entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Successful writes
    pub sets: u64,
    /// Successful deletes
    pub deletes: u64,
    /// hits + misses
    pub requests: u64,
    /// hits / max(requests, 1)
    pub hit_rate: f64,
}

/// Keyed TTL store over a durable cache backend.
///
/// Keys are `(category, identifier)` pairs rendered as
/// `<namespace>:<category>:<identifier>`.
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
}

impl CacheStore {
    /// Create a store over a backend with the given TTL table.
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self {
            backend,
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }

    fn key(&self, category: CacheCategory, identifier: &str) -> String {
        format!("{}:{}:{}", self.config.namespace, category, identifier)
    }

    /// Fetch a payload. Any backend or decode fault degrades to a miss.
    pub async fn get<T: DeserializeOwned>(
        &self,
        category: CacheCategory,
        identifier: &str,
    ) -> Option<T> {
        let key = self.key(category, identifier);
        match self.backend.get(&key).await {
            Ok(Some(serialized)) => match serde_json::from_str::<CachedEnvelope<T>>(&serialized) {
                Ok(envelope) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!("Cache hit for {}", key);
                    Some(envelope.payload)
                }
                Err(e) => {
                    // A payload we can no longer decode is as good as absent
                    warn!("Discarding undecodable cache entry {}: {}", key, e);
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    None
                }
            },
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss for {}", key);
                None
            }
            Err(e) => {
                error!("Error getting {} from cache: {}", key, e);
                None
            }
        }
    }

    /// Store a payload under the category's TTL (or an explicit override).
    /// Returns false on any fault; callers treat that as a no-op.
    pub async fn set<T: Serialize>(
        &self,
        category: CacheCategory,
        identifier: &str,
        payload: &T,
        ttl: Option<Duration>,
    ) -> bool {
        let key = self.key(category, identifier);
        let ttl = ttl.unwrap_or_else(|| self.config.ttl_for(category));

        let envelope = CachedEnvelope {
            cached_at: Utc::now(),
            ttl_seconds: ttl.as_secs(),
            payload,
        };
        let serialized = match serde_json::to_string(&envelope) {
            Ok(s) => s,
            Err(e) => {
                error!("Error serializing cache entry {}: {}", key, e);
                return false;
            }
        };

        match self.backend.set_with_ttl(&key, serialized, ttl).await {
            Ok(()) => {
                self.sets.fetch_add(1, Ordering::Relaxed);
                debug!("Cached {} with TTL {}s", key, ttl.as_secs());
                true
            }
            Err(e) => {
                error!("Error setting cache entry {}: {}", key, e);
                false
            }
        }
    }

    /// Delete one entry. Returns whether an entry was removed.
    pub async fn delete(&self, category: CacheCategory, identifier: &str) -> bool {
        let key = self.key(category, identifier);
        match self.backend.delete(&key).await {
            Ok(true) => {
                self.deletes.fetch_add(1, Ordering::Relaxed);
                debug!("Deleted {}", key);
                true
            }
            Ok(false) => false,
            Err(e) => {
                error!("Error deleting {} from cache: {}", key, e);
                false
            }
        }
    }

    /// Delete every key matching a `*`-wildcard pattern (namespace
    /// prefix included by the caller). Returns the number deleted.
    pub async fn delete_by_pattern(&self, pattern: &str) -> u64 {
        match self.backend.delete_pattern(pattern).await {
            Ok(deleted) => {
                if deleted > 0 {
                    self.deletes.fetch_add(deleted, Ordering::Relaxed);
                    info!("Deleted {} keys matching pattern: {}", deleted, pattern);
                }
                deleted
            }
            Err(e) => {
                error!("Error deleting pattern {} from cache: {}", pattern, e);
                0
            }
        }
    }

    /// Whether an unexpired entry exists.
    pub async fn exists(&self, category: CacheCategory, identifier: &str) -> bool {
        let key = self.key(category, identifier);
        match self.backend.exists(&key).await {
            Ok(exists) => exists,
            Err(e) => {
                error!("Error checking cache existence for {}: {}", key, e);
                false
            }
        }
    }

    /// Remaining TTL of an entry, `None` when absent or expired.
    pub async fn remaining_ttl(
        &self,
        category: CacheCategory,
        identifier: &str,
    ) -> Option<Duration> {
        let key = self.key(category, identifier);
        match self.backend.ttl_remaining(&key).await {
            Ok(remaining) => remaining,
            Err(e) => {
                error!("Error getting TTL for {}: {}", key, e);
                None
            }
        }
    }

    /// Drop every cached entry. Returns false on fault.
    pub async fn flush_all(&self) -> bool {
        match self.backend.flush_all().await {
            Ok(()) => {
                info!("Cleared all cache data");
                true
            }
            Err(e) => {
                error!("Error clearing cache: {}", e);
                false
            }
        }
    }

    /// Counter snapshot. Hit rate uses a denominator floor of 1.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let requests = hits + misses;
        CacheStats {
            hits,
            misses,
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            requests,
            hit_rate: hits as f64 / requests.max(1) as f64,
        }
    }

    /// Health signal: the backend answers a ping.
    pub async fn is_healthy(&self) -> bool {
        match self.backend.ping().await {
            Ok(()) => true,
            Err(e) => {
                error!("Cache health check failed: {}", e);
                false
            }
        }
    }
}
