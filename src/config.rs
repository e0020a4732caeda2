//! Server configuration.
//!
//! [`ServerConfig`] is resolved in three layers: built-in defaults, an
//! optional TOML file, then command-line flags (which fall back to
//! environment variables). Every field has a default, so an empty file is a
//! valid configuration.
//!
//! ```toml
//! port = 8080
//! bind = "0.0.0.0"
//! store_path = "./data"
//! persist_for = "24h"
//! max_request_size = 10240
//! rate_limit_per_second = 10.0
//! rate_limit_burst = 5
//! in_memory = false
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Non-fatal warnings that should be logged but don't prevent operation.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if there are any warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Effective server settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub port: u16,
    pub bind: String,
    /// Directory holding the redb file.
    pub store_path: PathBuf,
    /// Sliding retention, e.g. `24h`, `90m`, `1h30m`.
    pub persist_for: String,
    /// Largest accepted `Content-Length`, in bytes.
    pub max_request_size: u64,
    pub rate_limit_per_second: f64,
    pub rate_limit_burst: u32,
    /// Keep records in process memory instead of on disk.
    pub in_memory: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: constants::DEFAULT_PORT,
            bind: constants::DEFAULT_BIND.to_string(),
            store_path: PathBuf::from(constants::DEFAULT_STORE_PATH),
            persist_for: constants::DEFAULT_PERSIST_DURATION.to_string(),
            max_request_size: constants::DEFAULT_MAX_REQUEST_SIZE,
            rate_limit_per_second: constants::DEFAULT_RATE_LIMIT_PER_SECOND,
            rate_limit_burst: constants::DEFAULT_RATE_LIMIT_BURST,
            in_memory: false,
        }
    }
}

/// Values given on the command line (or via environment).
///
/// `None` leaves the lower layer untouched.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub store_path: Option<PathBuf>,
    pub persist_for: Option<String>,
    pub in_memory: bool,
}

impl ServerConfig {
    /// Load configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read (IO error)
    /// - The file contains invalid TOML syntax
    /// - A key is unknown or has the wrong type
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ServerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Defaults, then the optional file, then `overrides`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is given but cannot be loaded.
    pub fn resolve(file: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        Ok(config)
    }

    /// Apply command-line values on top of this configuration.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(bind) = overrides.bind {
            self.bind = bind;
        }
        if let Some(store_path) = overrides.store_path {
            self.store_path = store_path;
        }
        if let Some(persist_for) = overrides.persist_for {
            self.persist_for = persist_for;
        }
        if overrides.in_memory {
            self.in_memory = true;
        }
    }

    /// Parsed retention window.
    ///
    /// # Errors
    ///
    /// Returns an error if `persist_for` is not a valid non-zero duration.
    pub fn retention(&self) -> Result<Duration> {
        parse_duration(&self.persist_for)
            .with_context(|| format!("Invalid persist_for value '{}'", self.persist_for))
    }

    /// Path of the redb database file.
    pub fn store_file(&self) -> PathBuf {
        self.store_path.join(constants::STORE_FILE_NAME)
    }

    /// Address to listen on.
    ///
    /// # Errors
    ///
    /// Returns an error if `bind` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", self.bind))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Validate configuration with comprehensive checks.
    ///
    /// Returns a `ValidationResult` containing any non-fatal warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails with one or more errors:
    /// - Port 0 or an unparseable bind address
    /// - Invalid or zero retention
    /// - Zero request size
    /// - Non-positive rate or zero burst
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Listener
        if self.port == 0 {
            errors.push(
                "Server port cannot be 0. Use a valid port number (1-65535)\n  \
                 Common ports: 8080 (default), 8000, 3000"
                    .to_string(),
            );
        } else if self.port < 1024 {
            warnings.push(format!(
                "Server port {} is a system/privileged port (< 1024)\n  \
                 Recommendation: Use ports >= 1024 (e.g., 8080) to avoid permission issues",
                self.port
            ));
        }
        if let Err(e) = self.socket_addr() {
            errors.push(format!("{e:#}"));
        }

        // 2. Retention
        match self.retention() {
            Ok(retention) if retention.as_secs() < constants::MIN_RECOMMENDED_RETENTION_SECS => {
                warnings.push(format!(
                    "persist_for '{}' is very short (< {}s)\n  \
                     Records will expire almost immediately after each write",
                    self.persist_for,
                    constants::MIN_RECOMMENDED_RETENTION_SECS
                ));
            },
            Ok(_) => {},
            Err(e) => errors.push(format!("{e:#}")),
        }

        // 3. Request limits
        if self.max_request_size == 0 {
            errors.push("max_request_size cannot be 0".to_string());
        }
        if !self.rate_limit_per_second.is_finite() || self.rate_limit_per_second <= 0.0 {
            errors.push(format!(
                "rate_limit_per_second must be a positive number (got: {})",
                self.rate_limit_per_second
            ));
        }
        if self.rate_limit_burst == 0 {
            errors.push("rate_limit_burst cannot be 0".to_string());
        }

        // 4. Storage
        if !self.in_memory && self.store_path.is_file() {
            errors.push(format!(
                "store_path is not a directory: {}",
                self.store_path.display()
            ));
        }

        if !errors.is_empty() {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }

        Ok(ValidationResult { warnings })
    }
}

/// Parse a human-readable duration such as `30s`, `90m`, `24h`, `7d` or
/// `1h30m`.
///
/// # Errors
///
/// Returns an error for unknown units, a number without a unit, overflow, or
/// a total of zero.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    if input.is_empty() {
        anyhow::bail!("duration cannot be empty");
    }

    let mut total_secs: u64 = 0;
    let mut current = String::new();

    for c in input.chars() {
        let unit_secs = match c {
            '0'..='9' => {
                current.push(c);
                continue;
            },
            ' ' => continue,
            's' | 'S' => 1,
            'm' | 'M' => 60,
            'h' | 'H' => 60 * 60,
            'd' | 'D' => 24 * 60 * 60,
            _ => anyhow::bail!(
                "invalid character '{c}' in duration '{input}'. Valid units: s, m, h, d"
            ),
        };

        if current.is_empty() {
            anyhow::bail!("missing number before '{c}' in duration '{input}'");
        }
        let value: u64 = current
            .parse()
            .with_context(|| format!("invalid number in duration '{input}'"))?;
        total_secs = value
            .checked_mul(unit_secs)
            .and_then(|secs| total_secs.checked_add(secs))
            .with_context(|| format!("duration '{input}' is too large"))?;
        current.clear();
    }

    if !current.is_empty() {
        anyhow::bail!("duration '{input}' ends with a number without unit. Use s, m, h or d");
    }
    if total_secs == 0 {
        anyhow::bail!("duration '{input}' evaluates to zero");
    }

    Ok(Duration::from_secs(total_secs))
}
