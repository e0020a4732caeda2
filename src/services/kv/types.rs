//! Persisted entry layout for the redb backend.
//!
//! An entry is the value bytes prefixed by an 8-byte big-endian expiry in
//! Unix milliseconds. An expiry of `0` means the entry never expires.

use anyhow::{Context, Result, bail};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const HEADER_LEN: usize = 8;

/// A stored value with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KvEntry {
    pub value: Vec<u8>,
    pub expires_at_ms: Option<u64>,
}

impl KvEntry {
    /// Entry that never expires.
    pub fn new(value: Vec<u8>) -> Self {
        Self {
            value,
            expires_at_ms: None,
        }
    }

    /// Entry expiring `ttl` from now.
    pub fn with_ttl(value: Vec<u8>, ttl: Duration) -> Result<Self> {
        let ttl_ms = u64::try_from(ttl.as_millis()).context("TTL out of range")?;
        let expires_at_ms = now_ms()?.saturating_add(ttl_ms);
        Ok(Self {
            value,
            expires_at_ms: Some(expires_at_ms),
        })
    }

    pub fn is_expired(&self) -> Result<bool> {
        let Some(expires_at_ms) = self.expires_at_ms else {
            return Ok(false);
        };
        Ok(expires_at_ms <= now_ms()?)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.value.len());
        out.extend_from_slice(&self.expires_at_ms.unwrap_or(0).to_be_bytes());
        out.extend_from_slice(&self.value);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            bail!("entry too short: {} bytes", bytes.len());
        }
        let (header, value) = bytes.split_at(HEADER_LEN);
        let mut raw = [0u8; HEADER_LEN];
        raw.copy_from_slice(header);
        let expires_at_ms = match u64::from_be_bytes(raw) {
            0 => None,
            ms => Some(ms),
        };
        Ok(Self {
            value: value.to_vec(),
            expires_at_ms,
        })
    }
}

fn now_ms() -> Result<u64> {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before the Unix epoch")?;
    u64::try_from(since_epoch.as_millis()).context("System clock out of range")
}
