//! HTTP handlers organized by operation.

mod delete;
mod download;
mod keys;
mod status;
mod upload;

// Re-export all handlers for use in routing
pub(crate) use delete::delete;
pub(crate) use download::{download_base64, download_json, download_plain};
pub(crate) use keys::key_pair;
pub(crate) use status::{health, not_found, stats};
pub(crate) use upload::{patch, patch_at, upload};

use axum::http::{HeaderMap, header};

/// Host the client addressed, used to build absolute download URLs.
fn request_host(headers: &HeaderMap) -> &str {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost")
}

/// Strip the separators a catch-all segment may carry.
fn trim_path(path: &str) -> &str {
    path.trim_matches('/')
}
