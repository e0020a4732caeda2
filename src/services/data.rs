//! Data service: the five store operations.
//!
//! Both the HTTP handlers and any other adapter call only this service. It
//! validates upload keys, derives download keys, and reads and writes
//! records through [`KvStore`], applying the path merge for patches.

use chrono::Utc;
use tracing::{debug, error};

use crate::credential;
use crate::error::{Error, Result};
use crate::record::{Params, Record, Value};
use crate::services::kv::KvStore;

/// Freshly issued credential pair (untagged).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub upload_key: String,
    pub download_key: String,
}

/// Outcome of a successful upload or patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    /// Download key the record is stored under.
    pub download_key: String,
    /// Record as stored, timestamp included.
    pub record: Record,
}

/// Orchestrates credentials, storage and path merge.
#[derive(Clone)]
pub struct DataService {
    store: KvStore,
}

impl DataService {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    /// Underlying record store.
    pub fn store(&self) -> &KvStore {
        &self.store
    }

    /// Issue a new upload/download key pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CredentialDerivation`] if the fresh key cannot be
    /// derived, which indicates an internal fault.
    pub fn generate_key_pair(&self) -> Result<KeyPair> {
        let upload_key = credential::generate();
        let download_key = derive_checked(&upload_key)?;
        Ok(KeyPair {
            upload_key,
            download_key,
        })
    }

    /// Replace the record for `upload_key` with `params` plus a timestamp.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCredentialFormat`] for a malformed key.
    /// - [`Error::Encode`] / [`Error::Storage`] if the write fails.
    pub async fn upload(&self, upload_key: &str, params: &Params) -> Result<Written> {
        credential::validate(upload_key)?;
        let download_key = derive_checked(upload_key)?;

        let mut record = Record::from_params(params);
        record.stamp(Utc::now());

        self.store.put(&download_key, &record).await?;
        debug!(download_key = %download_key, fields = params.len(), "Uploaded record");

        Ok(Written {
            download_key,
            record,
        })
    }

    /// Merge `params` into the record for `upload_key` at `path`.
    ///
    /// A missing record starts out empty. The root timestamp is refreshed
    /// regardless of `path`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCredentialFormat`] for a malformed key.
    /// - [`Error::Decode`] / [`Error::Encode`] / [`Error::Storage`] if the
    ///   existing record cannot be read or the result cannot be written.
    pub async fn patch(&self, upload_key: &str, path: &str, params: &Params) -> Result<Written> {
        credential::validate(upload_key)?;
        let download_key = derive_checked(upload_key)?;

        let existing = self.store.get_or_empty(&download_key).await?;
        let mut record = existing.merged(path, params);
        record.stamp(Utc::now());

        self.store.put(&download_key, &record).await?;
        debug!(download_key = %download_key, path, fields = params.len(), "Patched record");

        Ok(Written {
            download_key,
            record,
        })
    }

    /// Raw stored JSON for `download_key` (tag optional).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no live record exists.
    pub async fn download_json(&self, download_key: &str) -> Result<Vec<u8>> {
        let key = credential::normalize_download_key(download_key);
        self.store.get_raw(&key).await
    }

    /// Single field of the record for `download_key` at `field_path`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if no live record exists or the field is absent.
    /// - [`Error::InvalidPath`] if the path runs into a leaf.
    pub async fn download_field(&self, download_key: &str, field_path: &str) -> Result<Value> {
        let key = credential::normalize_download_key(download_key);
        let record = self.store.get(&key).await?;
        record.field(field_path).cloned()
    }

    /// Delete the record for `upload_key`. Deleting an absent record succeeds.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCredentialFormat`] for a malformed key.
    /// - [`Error::Storage`] if the backend delete fails.
    pub async fn delete(&self, upload_key: &str) -> Result<String> {
        credential::validate(upload_key)?;
        let download_key = derive_checked(upload_key)?;

        self.store.delete(&download_key).await?;
        Ok(download_key)
    }
}

/// Derive after validation has already passed; a failure here is ours.
fn derive_checked(upload_key: &str) -> Result<String> {
    credential::derive(upload_key).map_err(|e| {
        error!(error = %e, "Failed to derive download key");
        Error::CredentialDerivation(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TIMESTAMP_KEY;
    use std::time::Duration;

    const KEY_UP: &str = "8e88f1b62b946dd3fccfd8eaf54c9a2e5e27747c3662f2e20645073e4626d7c5";
    const KEY_DOWN: &str = "fcbbda7c04eba41d060b70d1bf7fde8c4a148a087729017d22fc54037c9eb11b";

    fn service() -> DataService {
        DataService::new(KvStore::memory(Duration::from_secs(60)))
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_generate_key_pair() {
        let pair = service().generate_key_pair().unwrap();
        assert_eq!(pair.upload_key.len(), 64);
        assert_eq!(
            credential::derive(&pair.upload_key).unwrap(),
            pair.download_key
        );
    }

    #[tokio::test]
    async fn test_upload_then_download_json() {
        let svc = service();
        let before = Utc::now() - chrono::TimeDelta::seconds(1);

        let written = svc
            .upload(KEY_UP, &params(&[("temp", "21"), ("hum", "40")]))
            .await
            .unwrap();
        assert_eq!(written.download_key, KEY_DOWN);

        let after = Utc::now() + chrono::TimeDelta::seconds(1);
        let raw = svc.download_json(KEY_DOWN).await.unwrap();
        let record = Record::from_json(&raw).unwrap();

        assert_eq!(record.get("temp"), Some(&Value::from("21")));
        assert_eq!(record.get("hum"), Some(&Value::from("40")));
        assert_eq!(record.fields().len(), 3);
        let ts = record.timestamp().expect("timestamp present");
        assert!(ts >= before && ts <= after);
    }

    #[tokio::test]
    async fn test_upload_replaces_previous_record() {
        let svc = service();

        svc.upload(KEY_UP, &params(&[("a", "1")])).await.unwrap();
        svc.upload(KEY_UP, &params(&[("b", "2")])).await.unwrap();

        let record = Record::from_json(&svc.download_json(KEY_DOWN).await.unwrap()).unwrap();
        assert!(record.get("a").is_none());
        assert_eq!(record.get("b"), Some(&Value::from("2")));
    }

    #[tokio::test]
    async fn test_tagged_keys() {
        let svc = service();

        let written = svc
            .upload(&credential::tag_upload(KEY_UP), &params(&[("v", "1")]))
            .await
            .unwrap();
        assert_eq!(written.download_key, KEY_DOWN);

        let value = svc
            .download_field(&credential::tag_download(KEY_DOWN), "v")
            .await
            .unwrap();
        assert_eq!(value, Value::from("1"));
    }

    #[tokio::test]
    async fn test_invalid_upload_key() {
        let svc = service();

        assert!(matches!(
            svc.upload("short", &Params::new()).await,
            Err(Error::InvalidCredentialFormat(_))
        ));
        assert!(matches!(
            svc.patch("short", "", &Params::new()).await,
            Err(Error::InvalidCredentialFormat(_))
        ));
        assert!(matches!(
            svc.delete("short").await,
            Err(Error::InvalidCredentialFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_patches_to_sibling_paths_coexist() {
        let svc = service();

        svc.patch(KEY_UP, "room1", &params(&[("temp", "20")]))
            .await
            .unwrap();
        svc.patch(KEY_UP, "room2", &params(&[("temp", "22")]))
            .await
            .unwrap();

        assert_eq!(
            svc.download_field(KEY_DOWN, "room1/temp").await.unwrap(),
            Value::from("20")
        );
        assert_eq!(
            svc.download_field(KEY_DOWN, "room2/temp").await.unwrap(),
            Value::from("22")
        );
        assert!(
            svc.download_field(KEY_DOWN, TIMESTAMP_KEY)
                .await
                .unwrap()
                .as_leaf()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_patch_keeps_existing_root_fields() {
        let svc = service();

        svc.upload(KEY_UP, &params(&[("a", "1")])).await.unwrap();
        let written = svc
            .patch(KEY_UP, "", &params(&[("b", "2")]))
            .await
            .unwrap();

        assert_eq!(written.record.get("a"), Some(&Value::from("1")));
        assert_eq!(written.record.get("b"), Some(&Value::from("2")));
    }

    #[tokio::test]
    async fn test_download_field_errors() {
        let svc = service();
        svc.upload(KEY_UP, &params(&[("a", "scalar")])).await.unwrap();

        assert!(matches!(
            svc.download_field(KEY_DOWN, "a/invalid").await,
            Err(Error::InvalidPath { .. })
        ));
        assert!(matches!(
            svc.download_field(KEY_DOWN, "missing").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_download_unknown_key() {
        let svc = service();
        let unknown = credential::derive(&credential::generate()).unwrap();

        assert!(matches!(
            svc.download_json(&unknown).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            svc.download_field(&unknown, "x").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_then_download() {
        let svc = service();
        svc.upload(KEY_UP, &params(&[("a", "1")])).await.unwrap();

        assert_eq!(svc.delete(KEY_UP).await.unwrap(), KEY_DOWN);
        assert!(matches!(
            svc.download_json(KEY_DOWN).await,
            Err(Error::NotFound(_))
        ));
        // Deleting again is fine
        assert_eq!(svc.delete(KEY_UP).await.unwrap(), KEY_DOWN);
    }

    #[tokio::test]
    async fn test_uppercase_download_key() {
        let svc = service();
        svc.upload(KEY_UP, &params(&[("a", "1")])).await.unwrap();

        assert!(svc.download_json(&KEY_DOWN.to_uppercase()).await.is_ok());
    }
}
