//! Server startup.
//!
//! - [`build_state`] opens the storage engine and wires the shared components.
//! - [`serve`] binds the listener and runs until Ctrl-C.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::constants::PURGE_INTERVAL_SECS;
use crate::http::{self, AppState};
use crate::reliability::RateLimiter;
use crate::services::DataService;
use crate::services::kv::KvStore;
use crate::stats::StatsAggregator;

/// Open the store and assemble the request state.
///
/// # Errors
///
/// Returns an error if the retention window or rate limit is invalid, or the
/// redb file cannot be opened.
pub fn build_state(config: &ServerConfig) -> Result<AppState> {
    let retention = config.retention()?;

    let store = if config.in_memory {
        info!("Using in-memory store; records are lost on exit");
        KvStore::memory(retention)
    } else {
        let path = config.store_file();
        info!(path = %path.display(), "Opening store");
        KvStore::file(&path, retention)
            .with_context(|| format!("Failed to open store at {}", path.display()))?
    };

    let limiter = RateLimiter::new(config.rate_limit_per_second, config.rate_limit_burst)
        .context("Invalid rate limit configuration")?;

    Ok(AppState::new(
        DataService::new(store),
        Arc::new(StatsAggregator::new()),
        Arc::new(limiter),
        config.max_request_size,
    ))
}

/// Periodically reclaim expired records.
pub fn spawn_purge_task(store: KvStore, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {},
                Ok(removed) => debug!(removed, "Purged expired records"),
                Err(e) => warn!(error = %e, "Failed to purge expired records"),
            }
        }
    })
}

/// Run the HTTP server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the store cannot be
/// opened, or the listener cannot be bound.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let validation = config.validate()?;
    for warning in &validation.warnings {
        warn!("{warning}");
    }

    info!(
        port = config.port,
        bind = %config.bind,
        persist_for = %config.persist_for,
        in_memory = config.in_memory,
        max_request_size = config.max_request_size,
        rate_limit_per_second = config.rate_limit_per_second,
        rate_limit_burst = config.rate_limit_burst,
        "Starting ephemeral store"
    );

    let state = build_state(&config)?;
    let purge = spawn_purge_task(
        state.data.store().clone(),
        Duration::from_secs(PURGE_INTERVAL_SECS),
    );

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(
        listener,
        http::router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    purge.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
