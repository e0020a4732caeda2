//! Upload/download credential derivation.
//!
//! An upload key is a secret 256-bit random value, hex encoded. Its download
//! key is the SHA-256 digest of the (lower-cased) hex text, hex encoded.
//! Holding the upload key grants write access to exactly one record; the
//! download key grants read access only and cannot be inverted.
//!
//! Keys may carry a presentation tag (`u_` / `d_`). Tags are stripped before
//! validation and derivation and only re-added when keys are shown to users.

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::constants::CREDENTIAL_BYTES;
use crate::error::{Error, Result};

/// Optional tag on upload keys.
pub const UPLOAD_TAG: &str = "u_";

/// Optional tag on download keys.
pub const DOWNLOAD_TAG: &str = "d_";

const INVALID_FORMAT: &str = "uploadKey must be a 256 bit hex string";

/// Remove the optional `u_` tag.
pub fn strip_upload_tag(key: &str) -> &str {
    key.strip_prefix(UPLOAD_TAG).unwrap_or(key)
}

/// Remove the optional `d_` tag.
pub fn strip_download_tag(key: &str) -> &str {
    key.strip_prefix(DOWNLOAD_TAG).unwrap_or(key)
}

/// Add the `u_` tag for presentation.
pub fn tag_upload(key: &str) -> String {
    format!("{UPLOAD_TAG}{key}")
}

/// Add the `d_` tag for presentation.
pub fn tag_download(key: &str) -> String {
    format!("{DOWNLOAD_TAG}{key}")
}

/// Canonical form of a download key: untagged, lower-case.
pub fn normalize_download_key(key: &str) -> String {
    strip_download_tag(key).to_ascii_lowercase()
}

/// Generate a fresh upload key from the operating system CSPRNG.
///
/// # Panics
///
/// Panics if the entropy source fails. There is no safe fallback for
/// credential material.
pub fn generate() -> String {
    let mut bytes = [0u8; CREDENTIAL_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .unwrap_or_else(|e| panic!("failed to generate random bytes: {e}"));
    hex::encode(bytes)
}

/// Check that `upload` (tag optional) is 256 bits of hex, in any case.
///
/// # Errors
///
/// Returns [`Error::InvalidCredentialFormat`] for non-hex input or a
/// decoded length other than 32 bytes.
pub fn validate(upload: &str) -> Result<()> {
    let key = strip_upload_tag(upload).to_ascii_lowercase();
    match hex::decode(&key) {
        Ok(decoded) if decoded.len() == CREDENTIAL_BYTES => Ok(()),
        _ => Err(Error::InvalidCredentialFormat(INVALID_FORMAT.to_string())),
    }
}

/// Derive the download key for `upload` (tag optional).
///
/// # Errors
///
/// Returns [`Error::InvalidCredentialFormat`] unless the untagged key
/// decodes to exactly 32 bytes of hex.
pub fn derive(upload: &str) -> Result<String> {
    let key = strip_upload_tag(upload).to_ascii_lowercase();
    let decoded_len = hex::decode(&key).map(|b| b.len()).map_err(|_| {
        Error::InvalidCredentialFormat(format!("invalid upload key length: {}", key.len()))
    })?;
    if decoded_len != CREDENTIAL_BYTES {
        return Err(Error::InvalidCredentialFormat(format!(
            "invalid upload key length: {}",
            key.len()
        )));
    }

    let digest = Sha256::digest(key.as_bytes());
    Ok(hex::encode(digest))
}
