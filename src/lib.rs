//! Ephemeral, capability-based key-value store.
//!
//! A client obtains a random upload key; its SHA-256 digest is the download
//! key. Writes go through the upload key, reads through the download key,
//! and every record expires a fixed retention window after its last write.
//!
//! - [`credential`] - key generation, validation and derivation
//! - [`record`] - the stored value tree, path merge and traversal
//! - [`services`] - record storage and the data service
//! - [`reliability`] - per-client rate limiting
//! - [`stats`] - request counters with a rolling 24-hour window
//! - [`http`] - axum router, middleware and handlers

pub mod config;
pub mod constants;
pub mod credential;
pub mod error;
pub mod http;
pub mod record;
pub mod reliability;
pub mod server;
pub mod services;
pub mod stats;

pub use error::{Error, Result};
