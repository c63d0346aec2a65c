//! In-memory cache backend.
//!
//! Ships with the crate for tests and cache-less deployments. Expiry is
//! native to the backend: a key past its deadline is dropped on access and
//! reported missing, matching the contract external stores fulfill with
//! their own TTL machinery.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::warn;

use super::backend::{BackendError, CacheBackend};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Process-local [`CacheBackend`] with per-key TTL.
#[derive(Default)]
pub struct InMemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the entry map, recovering from poison if necessary.
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("In-memory cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Match a key against a `*`-wildcard pattern (anchored at both ends).
fn key_matches(pattern: &str, key: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return pattern == key;
    }

    let mut rest = key;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(segment) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == segments.len() - 1 {
            return rest.ends_with(segment);
        } else {
            match rest.find(segment) {
                Some(pos) => rest = &rest[pos + segment.len()..],
                None => return false,
            }
        }
    }
    true
}

#[async_trait]
impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let mut entries = self.lock_entries();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), BackendError> {
        let mut entries = self.lock_entries();
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, BackendError> {
        Ok(self.lock_entries().remove(key).is_some())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, BackendError> {
        let mut entries = self.lock_entries();
        let matching: Vec<String> = entries
            .keys()
            .filter(|k| key_matches(pattern, k))
            .cloned()
            .collect();
        for key in &matching {
            entries.remove(key);
        }
        Ok(matching.len() as u64)
    }

    async fn exists(&self, key: &str) -> Result<bool, BackendError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>, BackendError> {
        let entries = self.lock_entries();
        Ok(entries.get(key).and_then(|entry| {
            entry.expires_at.checked_duration_since(Instant::now())
        }))
    }

    async fn flush_all(&self) -> Result<(), BackendError> {
        self.lock_entries().clear();
        Ok(())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_matches() {
        assert!(key_matches("qg:quote:*", "qg:quote:AAPL"));
        assert!(key_matches("*", "anything"));
        assert!(key_matches("qg:*:AAPL", "qg:quote:AAPL"));
        assert!(key_matches("exact", "exact"));
        assert!(!key_matches("exact", "exact2"));
        assert!(!key_matches("qg:quote:*", "qg:search:AAPL"));
        assert!(!key_matches("qg:*:AAPL", "qg:quote:MSFT"));
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let backend = InMemoryBackend::new();
        backend
            .set_with_ttl("k", "v".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(backend.get("k").await.unwrap(), Some("v".to_string()));
        assert!(backend.exists("k").await.unwrap());
        assert!(backend.delete("k").await.unwrap());
        assert!(!backend.delete("k").await.unwrap());
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_native_expiry() {
        let backend = InMemoryBackend::new();
        backend
            .set_with_ttl("k", "v".to_string(), Duration::from_millis(20))
            .await
            .unwrap();

        assert!(backend.get("k").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(backend.get("k").await.unwrap().is_none());
        assert!(!backend.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let backend = InMemoryBackend::new();
        for key in ["qg:quote:AAPL", "qg:quote:MSFT", "qg:search:apple"] {
            backend
                .set_with_ttl(key, "v".to_string(), Duration::from_secs(60))
                .await
                .unwrap();
        }

        let deleted = backend.delete_pattern("qg:quote:*").await.unwrap();
        assert_eq!(deleted, 2);
        assert!(backend.get("qg:search:apple").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ttl_remaining() {
        let backend = InMemoryBackend::new();
        backend
            .set_with_ttl("k", "v".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        let remaining = backend.ttl_remaining("k").await.unwrap().unwrap();
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(58));
        assert!(backend.ttl_remaining("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_flush_all() {
        let backend = InMemoryBackend::new();
        backend
            .set_with_ttl("k", "v".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        backend.flush_all().await.unwrap();
        assert!(backend.get("k").await.unwrap().is_none());
    }
}
