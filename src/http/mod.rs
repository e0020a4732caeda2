//! HTTP surface.
//!
//! All routes are `GET`. Layers run outermost first:
//! error accounting, CORS, request size limit, rate limit.

pub mod audit;
mod handlers;
mod middleware;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use crate::error::Error;
use crate::reliability::RateLimiter;
use crate::services::DataService;
use crate::stats::StatsAggregator;

use self::audit::{AuditEvent, log_audit_event};

/// State shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub data: DataService,
    pub stats: Arc<StatsAggregator>,
    pub limiter: Arc<RateLimiter>,
    /// Largest accepted `Content-Length`.
    pub max_request_size: u64,
}

impl AppState {
    pub fn new(
        data: DataService,
        stats: Arc<StatsAggregator>,
        limiter: Arc<RateLimiter>,
        max_request_size: u64,
    ) -> Self {
        Self {
            data,
            stats,
            limiter,
            max_request_size,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/kp", get(handlers::key_pair))
        .route("/health", get(handlers::health))
        .route("/api/stats", get(handlers::stats))
        // Upload
        .route("/u/{key}", get(handlers::upload))
        .route("/u/{key}/", get(handlers::upload))
        .route("/{key}/", get(handlers::upload))
        // Patch
        .route("/patch/{key}", get(handlers::patch))
        .route("/patch/{key}/", get(handlers::patch))
        .route("/patch/{key}/{*path}", get(handlers::patch_at))
        // Download
        .route("/d/{key}/json", get(handlers::download_json))
        .route("/{key}/json", get(handlers::download_json))
        .route("/d/{key}/plain/{*field}", get(handlers::download_plain))
        .route("/{key}/plain/{*field}", get(handlers::download_plain))
        .route(
            "/d/{key}/plain-from-base64url/{*field}",
            get(handlers::download_base64),
        )
        // Delete
        .route("/delete/{key}", get(handlers::delete))
        .route("/delete/{key}/", get(handlers::delete))
        .fallback(handlers::not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::limit_request_size,
        ))
        .layer(cors)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::count_errors,
        ))
        .with_state(state)
}

/// Handler error.
#[derive(Debug)]
pub(crate) enum AppError {
    Store(Error),
    /// Stored value is not valid base64 in any accepted alphabet.
    Base64Decode,
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self::Store(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Store(err) => err.into_response(),
            Self::Base64Decode => {
                text_response(StatusCode::INTERNAL_SERVER_ERROR, "Error decoding base64url")
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = match &self {
            Error::RateLimited { .. } => "Too Many Requests".to_string(),
            Error::RequestTooLarge { .. } => "Request size is too large".to_string(),
            Error::InvalidCredentialFormat(reason) => {
                log_audit_event(AuditEvent::InvalidCredential {
                    reason: reason.clone(),
                });
                self.to_string()
            },
            err if err.is_client_error() => err.to_string(),
            err => {
                error!(error = %err, "Request failed");
                "Internal Server Error".to_string()
            },
        };

        text_response(status, &message)
    }
}

fn text_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        )],
        format!("{message}\n"),
    )
        .into_response()
}
