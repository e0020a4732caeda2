//! Shared in-process test host.
//!
//! Drives the router with `tower::ServiceExt::oneshot`, so no socket is
//! bound. Requests can optionally carry a peer address to exercise the rate
//! limiter.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use ephemeral_store::http::{self, AppState};
use ephemeral_store::reliability::RateLimiter;
use ephemeral_store::services::DataService;
use ephemeral_store::services::kv::KvStore;
use ephemeral_store::stats::StatsAggregator;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Known upload key and its download key.
pub const KEY_UP: &str = "8e88f1b62b946dd3fccfd8eaf54c9a2e5e27747c3662f2e20645073e4626d7c5";
pub const KEY_DOWN: &str = "fcbbda7c04eba41d060b70d1bf7fde8c4a148a087729017d22fc54037c9eb11b";

pub struct TestHostBuilder {
    rate_per_second: f64,
    burst: u32,
    max_request_size: u64,
    retention: Duration,
}

impl TestHostBuilder {
    pub fn rate_limit(mut self, per_second: f64, burst: u32) -> Self {
        self.rate_per_second = per_second;
        self.burst = burst;
        self
    }

    pub fn max_request_size(mut self, bytes: u64) -> Self {
        self.max_request_size = bytes;
        self
    }

    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn start(self) -> TestHost {
        let limiter = RateLimiter::new(self.rate_per_second, self.burst)
            .expect("valid rate limit");
        let state = AppState::new(
            DataService::new(KvStore::memory(self.retention)),
            Arc::new(StatsAggregator::new()),
            Arc::new(limiter),
            self.max_request_size,
        );
        TestHost {
            router: http::router(state.clone()),
            state,
        }
    }
}

pub struct TestHost {
    router: Router,
    pub state: AppState,
}

impl TestHost {
    pub fn builder() -> TestHostBuilder {
        TestHostBuilder {
            rate_per_second: 10.0,
            burst: 5,
            max_request_size: 10 * 1024,
            retention: Duration::from_secs(60),
        }
    }

    /// Send a request without peer information.
    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(req)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(get_request(uri)).await
    }

    /// GET as if sent from `peer`.
    pub async fn get_from(&self, uri: &str, peer: &str) -> Response<Body> {
        let addr: SocketAddr = peer.parse().expect("valid peer address");
        let mut req = get_request(uri);
        req.extensions_mut().insert(ConnectInfo(addr));
        self.send(req).await
    }
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("host", "store.test")
        .body(Body::empty())
        .expect("valid request")
}

pub async fn body_string(resp: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("readable body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub async fn body_json(resp: Response<Body>) -> serde_json::Value {
    let text = body_string(resp).await;
    serde_json::from_str(&text).expect("JSON body")
}
