//! Backend trait for the KV store.
//!
//! Defines the byte-level interface every storage backend implements, so
//! the record store can run on redb in production and in memory in tests.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Backend trait for key-value storage with per-write expiry.
///
/// All backends must be thread-safe (`Send + Sync`) for use with tokio.
/// Conflicting writes to the same key are serialized by the backend; the
/// last completed write wins.
#[async_trait]
pub trait KvBackend: Send + Sync + 'static {
    /// Retrieves a value by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist or has expired.
    /// Implementations should remove expired entries they come across.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores a key-value pair with an optional TTL.
    ///
    /// If `ttl` is `Some(duration)`, the entry expires after the specified
    /// duration, replacing any earlier expiry. If `None`, it never expires.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Deletes a key-value pair.
    ///
    /// Returns `Ok(true)` if the key existed and was removed,
    /// `Ok(false)` if it didn't exist. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Removes every expired entry, returning how many were removed.
    ///
    /// Expired entries are already invisible to `get`; this reclaims their
    /// space without waiting for a read.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn purge_expired(&self) -> Result<usize>;
}
