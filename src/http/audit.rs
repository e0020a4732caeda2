//! Security audit logging for request admission.
//!
//! Provides structured audit logging for security-relevant events like
//! rate-limit rejections, oversized requests and malformed credentials.

use std::net::SocketAddr;
use tracing::{info, warn};

/// Security audit events that should be logged for monitoring and alerting.
#[derive(Debug, Clone)]
pub enum AuditEvent {
    /// Client exhausted its token bucket
    RateLimited { client: String, path: String },
    /// Declared body size above the configured maximum
    RequestTooLarge {
        remote_addr: Option<SocketAddr>,
        path: String,
        size: u64,
        max: u64,
    },
    /// Upload key failed format validation
    InvalidCredential { reason: String },
}

/// Log a security audit event with structured fields.
pub fn log_audit_event(event: AuditEvent) {
    match event {
        AuditEvent::RateLimited { client, path } => {
            warn!(
                target: "audit",
                event_type = "rate_limited",
                %client,
                %path,
                "Rate limit exceeded"
            );
        },
        AuditEvent::RequestTooLarge {
            remote_addr,
            path,
            size,
            max,
        } => {
            warn!(
                target: "audit",
                event_type = "request_too_large",
                remote_addr = ?remote_addr,
                %path,
                size,
                max,
                "Request size is too large"
            );
        },
        AuditEvent::InvalidCredential { reason } => {
            info!(
                target: "audit",
                event_type = "invalid_credential",
                %reason,
                "Rejected malformed upload key"
            );
        },
    }
}
