//! Durable cache backend abstraction.
//!
//! The store consumes any key-value backend that offers native TTL expiry.
//! Values are serialized JSON strings; the backend never inspects them.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// A backend fault. The store catches these at its boundary and degrades
/// to a functional miss/no-op; they never reach the store's callers.
#[derive(Debug, Error)]
#[error("cache backend error: {message}")]
pub struct BackendError {
    /// Description of the fault
    pub message: String,
}

impl BackendError {
    /// Build an error from any displayable cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Key-value store with native per-key expiry.
///
/// Any backend offering these primitives is substitutable. Expired keys
/// must behave as missing - the application never scans for staleness.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch a value. Expired or absent keys return `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Store a value with a time-to-live.
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration)
        -> Result<(), BackendError>;

    /// Delete a key. Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, BackendError>;

    /// Delete all keys matching a `*`-wildcard pattern.
    /// Returns the number of keys deleted.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, BackendError>;

    /// Whether an unexpired value exists for the key.
    async fn exists(&self, key: &str) -> Result<bool, BackendError>;

    /// Remaining TTL for a key, `None` when absent or expired.
    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>, BackendError>;

    /// Drop every key.
    async fn flush_all(&self) -> Result<(), BackendError>;

    /// Liveness probe.
    async fn ping(&self) -> Result<(), BackendError>;
}
