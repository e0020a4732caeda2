//! Error types for typed error handling.
//!
//! Every failure a store operation can produce is a variant of [`Error`].
//! Client-caused failures (bad credentials, bad paths, limits) carry a
//! message that is safe to return to the caller. Server faults (derivation,
//! serialization, storage) are logged and surfaced as a generic failure.

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Store errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Credential is not 256 bits of hex.
    #[error("{0}")]
    InvalidCredentialFormat(String),

    /// Hashing or encoding the credential failed.
    #[error("error deriving download key: {0}")]
    CredentialDerivation(String),

    /// Record absent or expired, or field missing along a traversal.
    #[error("{0}")]
    NotFound(String),

    /// Traversal hit a leaf before the path was exhausted.
    #[error("invalid parameter path: '{path}'")]
    InvalidPath { path: String },

    /// Record could not be serialized.
    #[error("error encoding data to JSON: {0}")]
    Encode(#[source] serde_json::Error),

    /// Stored bytes could not be deserialized.
    #[error("error decoding stored JSON: {0}")]
    Decode(#[source] serde_json::Error),

    /// Client exceeded its token bucket.
    #[error("too many requests from {client}")]
    RateLimited { client: String },

    /// Client identifier could not be split into address and port.
    #[error("failed to parse client address '{addr}'")]
    ClientAddressUnparseable { addr: String },

    /// Declared request size above the configured maximum.
    #[error("request size {size} exceeds maximum of {max} bytes")]
    RequestTooLarge { size: u64, max: u64 },

    /// Underlying storage engine failure.
    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a not-found error for a missing record.
    pub fn record_not_found() -> Self {
        Self::NotFound("invalid download key or data not found".to_string())
    }

    /// Create a not-found error for a missing field.
    pub fn field_not_found(path: impl AsRef<str>) -> Self {
        Self::NotFound(format!("parameter '{}' not found", path.as_ref()))
    }

    /// Create an invalid path error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into() }
    }

    /// Create a rate limited error.
    pub fn rate_limited(client: impl Into<String>) -> Self {
        Self::RateLimited {
            client: client.into(),
        }
    }

    /// Get the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidCredentialFormat(_) | Self::InvalidPath { .. } => 400,
            Self::NotFound(_) => 404,
            Self::RequestTooLarge { .. } => 413,
            Self::RateLimited { .. } => 429,
            Self::CredentialDerivation(_)
            | Self::Encode(_)
            | Self::Decode(_)
            | Self::ClientAddressUnparseable { .. }
            | Self::Storage(_)
            | Self::Config(_) => 500,
        }
    }

    /// Whether the message may be shown to the caller verbatim.
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::InvalidCredentialFormat("x".into()).status_code(), 400);
        assert_eq!(Error::invalid_path("a/b").status_code(), 400);
        assert_eq!(Error::record_not_found().status_code(), 404);
        assert_eq!(Error::RequestTooLarge { size: 2, max: 1 }.status_code(), 413);
        assert_eq!(Error::rate_limited("10.0.0.1").status_code(), 429);
        assert_eq!(
            Error::Storage(anyhow::anyhow!("disk on fire")).status_code(),
            500
        );
    }

    #[test]
    fn test_server_faults_are_not_client_errors() {
        assert!(!Error::CredentialDerivation("boom".into()).is_client_error());
        assert!(
            !Error::ClientAddressUnparseable {
                addr: "nope".into()
            }
            .is_client_error()
        );
        assert!(Error::field_not_found("temp").is_client_error());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            Error::field_not_found("a/b").to_string(),
            "parameter 'a/b' not found"
        );
        assert_eq!(
            Error::invalid_path("a/b").to_string(),
            "invalid parameter path: 'a/b'"
        );
    }
}
