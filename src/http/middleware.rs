//! Request middleware.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::AppState;
use super::audit::{AuditEvent, log_audit_event};
use crate::error::Error;
use crate::reliability::Admission;

/// Count every response with status >= 400 exactly once.
pub(crate) async fn count_errors(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        state.stats.record_http_error();
    }
    response
}

/// Reject requests whose declared `Content-Length` exceeds the maximum.
pub(crate) async fn limit_request_size(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    if let Some(size) = declared
        && size > state.max_request_size
    {
        log_audit_event(AuditEvent::RequestTooLarge {
            remote_addr: peer(&req),
            path: req.uri().path().to_string(),
            size,
            max: state.max_request_size,
        });
        return Error::RequestTooLarge {
            size,
            max: state.max_request_size,
        }
        .into_response();
    }

    next.run(req).await
}

/// Per-client token bucket. Requests without peer information pass.
pub(crate) async fn rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(addr) = peer(&req) else {
        return next.run(req).await;
    };

    match state.limiter.admit_addr(addr) {
        Admission::Allow => next.run(req).await,
        Admission::Deny => {
            let client = addr.ip().to_string();
            state.stats.record_rate_limit_hit(&client);
            log_audit_event(AuditEvent::RateLimited {
                client: client.clone(),
                path: req.uri().path().to_string(),
            });
            Error::rate_limited(client).into_response()
        },
    }
}

fn peer(req: &Request) -> Option<SocketAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}
