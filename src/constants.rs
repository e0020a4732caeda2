//! Shared defaults and limits.

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default bind address.
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Default directory holding the persistent store.
pub const DEFAULT_STORE_PATH: &str = "./data";

/// File name of the redb database inside the store directory.
pub const STORE_FILE_NAME: &str = "values.redb";

/// Default retention window for records (sliding).
pub const DEFAULT_PERSIST_DURATION: &str = "24h";

/// Maximum accepted `Content-Length` (10 KiB).
pub const DEFAULT_MAX_REQUEST_SIZE: u64 = 10 * 1024;

/// Sustained requests per second per client.
pub const DEFAULT_RATE_LIMIT_PER_SECOND: f64 = 10.0;

/// Burst capacity per client.
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 5;

/// Retention windows below this trigger a configuration warning.
pub const MIN_RECOMMENDED_RETENTION_SECS: u64 = 60;

/// Size of an upload/download credential in bytes (256 bits).
pub const CREDENTIAL_BYTES: usize = 32;

/// Reserved root key refreshed on every write.
pub const TIMESTAMP_KEY: &str = "timestamp";

/// How often expired records are swept from the store.
pub const PURGE_INTERVAL_SECS: u64 = 300;
