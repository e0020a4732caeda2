//! Redb-backed KV storage backend.
//!
//! Provides persistent key-value storage using redb with ACID guarantees.
//! Each value is stored with its absolute expiry (see [`KvEntry`]).

use super::backend::KvBackend;
use super::types::KvEntry;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Table holding records keyed by download key.
pub(crate) const RECORDS_TABLE: TableDefinition<'static, &'static str, &'static [u8]> =
    TableDefinition::new("records");

/// Redb-backed key-value storage backend.
///
/// `RedbBackend` is `Clone` and can be shared across threads. redb allows a
/// single writer at a time, which serializes conflicting writes to a key.
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Opens or creates a redb database at the given path.
    ///
    /// Creates parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Parent directory cannot be created
    /// - Database file cannot be opened or created (permissions, disk full, etc.)
    /// - Initialization transaction fails to begin or commit
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;
        }

        let db = Database::create(path)
            .with_context(|| format!("Failed to open store database: {}", path.display()))?;

        // Create the table up front so read transactions can always open it
        let write_txn = db
            .begin_write()
            .context("Failed to begin initialization transaction")?;
        {
            let _table = write_txn
                .open_table(RECORDS_TABLE)
                .context("Failed to initialize records table")?;
        }
        write_txn
            .commit()
            .context("Failed to commit initialization transaction")?;

        Ok(Self { db: Arc::new(db) })
    }

    fn get_sync(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entry = {
            let read_txn = self
                .db
                .begin_read()
                .context("Failed to begin read transaction")?;
            let table = read_txn
                .open_table(RECORDS_TABLE)
                .context("Failed to open records table")?;

            let entry = match table
                .get(key)
                .with_context(|| format!("Failed to read key '{key}'"))?
            {
                Some(guard) => KvEntry::decode(guard.value())
                    .with_context(|| format!("Failed to decode entry for key '{key}'"))?,
                None => return Ok(None),
            };
            entry
        };

        if entry.is_expired()? {
            self.remove_if_expired_sync(key)?;
            Ok(None)
        } else {
            Ok(Some(entry.value))
        }
    }

    fn set_sync(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let entry = match ttl {
            Some(ttl) => KvEntry::with_ttl(value, ttl)?,
            None => KvEntry::new(value),
        };

        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;
        {
            let mut table = write_txn
                .open_table(RECORDS_TABLE)
                .context("Failed to open records table")?;
            table
                .insert(key, entry.encode().as_slice())
                .with_context(|| format!("Failed to insert key '{key}'"))?;
        }
        write_txn
            .commit()
            .context("Failed to commit set transaction")?;

        Ok(())
    }

    fn delete_sync(&self, key: &str) -> Result<bool> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;

        let removed = {
            let mut table = write_txn
                .open_table(RECORDS_TABLE)
                .context("Failed to open records table")?;
            table
                .remove(key)
                .with_context(|| format!("Failed to remove key '{key}'"))?
                .is_some()
        };

        write_txn
            .commit()
            .context("Failed to commit delete transaction")?;

        Ok(removed)
    }

    /// Removes `key` only if it is still expired inside the write
    /// transaction, so a concurrent rewrite is never lost.
    fn remove_if_expired_sync(&self, key: &str) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;
        {
            let mut table = write_txn
                .open_table(RECORDS_TABLE)
                .context("Failed to open records table")?;
            let expired = match table.get(key)? {
                Some(guard) => KvEntry::decode(guard.value())?.is_expired()?,
                None => false,
            };
            if expired {
                table.remove(key)?;
            }
        }
        write_txn
            .commit()
            .context("Failed to commit expiry transaction")?;
        Ok(())
    }

    fn purge_expired_sync(&self) -> Result<usize> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;
        let removed = {
            let mut table = write_txn
                .open_table(RECORDS_TABLE)
                .context("Failed to open records table")?;

            let mut expired_keys = Vec::new();
            for item in table.iter().context("Failed to iterate records table")? {
                let (key, value) = item.context("Failed to read record entry")?;
                // Undecodable entries are left for an operator to inspect
                if let Ok(entry) = KvEntry::decode(value.value())
                    && entry.is_expired()?
                {
                    expired_keys.push(key.value().to_string());
                }
            }

            for key in &expired_keys {
                table
                    .remove(key.as_str())
                    .with_context(|| format!("Failed to remove expired key '{key}'"))?;
            }
            expired_keys.len()
        };
        write_txn
            .commit()
            .context("Failed to commit purge transaction")?;

        debug!(removed, "Purged expired records");
        Ok(removed)
    }
}

#[async_trait]
impl KvBackend for RedbBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let backend = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || backend.get_sync(&key))
            .await
            .context("Task join error")?
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let backend = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || backend.set_sync(&key, value, ttl))
            .await
            .context("Task join error")?
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let backend = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || backend.delete_sync(&key))
            .await
            .context("Task join error")?
    }

    async fn purge_expired(&self) -> Result<usize> {
        let backend = self.clone();
        tokio::task::spawn_blocking(move || backend.purge_expired_sync())
            .await
            .context("Task join error")?
    }
}
