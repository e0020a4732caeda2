//! Record store over a pluggable `KvBackend`.
//!
//! `KvStore` owns the retention window. Every `put` writes with an expiry of
//! `retention` from now, replacing the previous expiry, so a record lives as
//! long as it keeps being written (sliding TTL).

use super::backend::KvBackend;
use super::memory::MemoryBackend;
use super::redb::RedbBackend;
use crate::error::{Error, Result};
use crate::record::Record;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Record store keyed by download key.
///
/// `KvStore` is `Clone` and can be shared across request handlers; the
/// backend handles concurrent access.
///
/// # Example
///
/// ```ignore
/// use ephemeral_store::services::kv::KvStore;
/// use std::time::Duration;
///
/// let store = KvStore::memory(Duration::from_secs(3600));
/// store.put(&download_key, &record).await?;
/// let record = store.get(&download_key).await?;
/// ```
#[derive(Clone)]
pub struct KvStore {
    backend: Arc<dyn KvBackend>,
    retention: Duration,
}

impl KvStore {
    /// Creates a store backed by a file-based redb database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn file<P: AsRef<Path>>(path: P, retention: Duration) -> anyhow::Result<Self> {
        let backend = RedbBackend::open(path)?;
        Ok(Self::custom(backend, retention))
    }

    /// Creates a store backed by process memory. All data is lost on exit.
    pub fn memory(retention: Duration) -> Self {
        Self::custom(MemoryBackend::new(), retention)
    }

    /// Creates a store with a custom backend.
    pub fn custom<B: KvBackend>(backend: B, retention: Duration) -> Self {
        Self {
            backend: Arc::new(backend),
            retention,
        }
    }

    /// Sliding retention applied to every write.
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Serializes `record` and stores it for `retention` from now.
    ///
    /// # Errors
    ///
    /// - [`Error::Encode`] if the record cannot be serialized.
    /// - [`Error::Storage`] if the backend write fails.
    pub async fn put(&self, key: &str, record: &Record) -> Result<()> {
        let bytes = record.to_json()?;
        debug!(key, bytes = bytes.len(), "Storing record");
        self.backend
            .set(key, bytes, Some(self.retention))
            .await
            .map_err(Error::Storage)
    }

    /// Returns the stored record.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the key is absent or expired.
    /// - [`Error::Decode`] if the stored bytes are not a record.
    /// - [`Error::Storage`] if the backend read fails.
    pub async fn get(&self, key: &str) -> Result<Record> {
        let bytes = self.get_raw(key).await?;
        Record::from_json(&bytes)
    }

    /// Returns the stored bytes without decoding them.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the key is absent or expired.
    /// - [`Error::Storage`] if the backend read fails.
    pub async fn get_raw(&self, key: &str) -> Result<Vec<u8>> {
        self.backend
            .get(key)
            .await
            .map_err(Error::Storage)?
            .ok_or_else(Error::record_not_found)
    }

    /// Like [`KvStore::get`], but an absent key yields an empty record.
    ///
    /// # Errors
    ///
    /// - [`Error::Decode`] if the stored bytes are not a record.
    /// - [`Error::Storage`] if the backend read fails.
    pub async fn get_or_empty(&self, key: &str) -> Result<Record> {
        match self.get(key).await {
            Err(Error::NotFound(_)) => Ok(Record::new()),
            other => other,
        }
    }

    /// Removes the key. Succeeds whether or not it existed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backend delete fails.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let existed = self.backend.delete(key).await.map_err(Error::Storage)?;
        debug!(key, existed, "Deleted record");
        Ok(())
    }

    /// Reclaims expired records. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backend sweep fails.
    pub async fn purge_expired(&self) -> Result<usize> {
        self.backend.purge_expired().await.map_err(Error::Storage)
    }
}
