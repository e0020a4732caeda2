//! Request statistics with a rolling 24-hour window.
//!
//! Lifetime counters only ever grow. Download, upload and HTTP error events
//! are also recorded into the bucket for the hour they happened in;
//! [`StatsAggregator::snapshot`] sums the buckets from the last 24 hours and
//! drops older ones. Rate-limit hits are kept per client, lifetime only.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use serde::Serialize;

const SECS_PER_HOUR: i64 = 3600;
const WINDOW_HOURS: i64 = 24;

/// Per-hour event counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct HourCounts {
    downloads: u64,
    uploads: u64,
    http_errors: u64,
}

/// Running hit count for one rate-limited client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitedClient {
    pub client: String,
    pub hits: u64,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub downloads: u64,
    pub uploads: u64,
    pub http_errors: u64,
    pub rate_limit_hits: u64,
    pub last_24h_downloads: u64,
    pub last_24h_uploads: u64,
    pub last_24h_http_errors: u64,
    /// Clients in order of their first rate-limit hit.
    pub rate_limited_clients: Vec<RateLimitedClient>,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug)]
struct StatsInner {
    downloads: u64,
    uploads: u64,
    http_errors: u64,
    rate_limit_hits: u64,
    rate_limited_clients: Vec<RateLimitedClient>,
    /// Keyed by hour index (seconds since epoch / 3600).
    hourly: BTreeMap<i64, HourCounts>,
}

/// Shared, lock-guarded statistics.
#[derive(Debug)]
pub struct StatsAggregator {
    start_time: DateTime<Utc>,
    inner: RwLock<StatsInner>,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::started_at(Utc::now())
    }

    fn started_at(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            inner: RwLock::new(StatsInner {
                downloads: 0,
                uploads: 0,
                http_errors: 0,
                rate_limit_hits: 0,
                rate_limited_clients: Vec::new(),
                hourly: BTreeMap::new(),
            }),
        }
    }

    pub fn record_download(&self) {
        self.record_download_at(Utc::now());
    }

    pub fn record_upload(&self) {
        self.record_upload_at(Utc::now());
    }

    pub fn record_http_error(&self) {
        self.record_http_error_at(Utc::now());
    }

    /// Count a rejected request from `client`.
    pub fn record_rate_limit_hit(&self, client: &str) {
        let mut inner = self.inner.write();
        inner.rate_limit_hits += 1;
        match inner
            .rate_limited_clients
            .iter_mut()
            .find(|c| c.client == client)
        {
            Some(entry) => entry.hits += 1,
            None => inner.rate_limited_clients.push(RateLimitedClient {
                client: client.to_string(),
                hits: 1,
            }),
        }
    }

    fn record_download_at(&self, at: DateTime<Utc>) {
        let mut inner = self.inner.write();
        inner.downloads += 1;
        inner.bucket(at).downloads += 1;
    }

    fn record_upload_at(&self, at: DateTime<Utc>) {
        let mut inner = self.inner.write();
        inner.uploads += 1;
        inner.bucket(at).uploads += 1;
    }

    fn record_http_error_at(&self, at: DateTime<Utc>) {
        let mut inner = self.inner.write();
        inner.http_errors += 1;
        inner.bucket(at).http_errors += 1;
    }

    /// Current counters. Drops hourly buckets older than 24 hours.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot_at(Utc::now())
    }

    fn snapshot_at(&self, now: DateTime<Utc>) -> StatsSnapshot {
        let cutoff = now - TimeDelta::hours(WINDOW_HOURS);
        let mut inner = self.inner.write();

        inner
            .hourly
            .retain(|&hour, _| hour_start(hour).is_none_or(|start| start >= cutoff));

        let recent = inner
            .hourly
            .values()
            .fold(HourCounts::default(), |acc, c| HourCounts {
                downloads: acc.downloads + c.downloads,
                uploads: acc.uploads + c.uploads,
                http_errors: acc.http_errors + c.http_errors,
            });

        StatsSnapshot {
            downloads: inner.downloads,
            uploads: inner.uploads,
            http_errors: inner.http_errors,
            rate_limit_hits: inner.rate_limit_hits,
            last_24h_downloads: recent.downloads,
            last_24h_uploads: recent.uploads,
            last_24h_http_errors: recent.http_errors,
            rate_limited_clients: inner.rate_limited_clients.clone(),
            start_time: self.start_time,
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Time since the aggregator was created.
    pub fn uptime(&self) -> Duration {
        (Utc::now() - self.start_time)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

impl StatsInner {
    fn bucket(&mut self, at: DateTime<Utc>) -> &mut HourCounts {
        self.hourly
            .entry(at.timestamp().div_euclid(SECS_PER_HOUR))
            .or_default()
    }
}

fn hour_start(hour: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(hour.checked_mul(SECS_PER_HOUR)?, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_counters() {
        let stats = StatsAggregator::new();
        stats.record_download();
        stats.record_upload();
        stats.record_upload();
        stats.record_http_error();
        stats.record_rate_limit_hit("192.168.1.1");

        let snap = stats.snapshot();
        assert_eq!(snap.downloads, 1);
        assert_eq!(snap.uploads, 2);
        assert_eq!(snap.http_errors, 1);
        assert_eq!(snap.rate_limit_hits, 1);
        assert_eq!(snap.last_24h_downloads, 1);
        assert_eq!(snap.last_24h_uploads, 2);
        assert_eq!(snap.last_24h_http_errors, 1);
    }

    #[test]
    fn test_rate_limited_clients() {
        let stats = StatsAggregator::new();
        stats.record_rate_limit_hit("10.0.0.1");
        stats.record_rate_limit_hit("10.0.0.2");
        stats.record_rate_limit_hit("10.0.0.1");

        let snap = stats.snapshot();
        assert_eq!(snap.rate_limit_hits, 3);
        assert_eq!(
            snap.rate_limited_clients,
            vec![
                RateLimitedClient {
                    client: "10.0.0.1".into(),
                    hits: 2
                },
                RateLimitedClient {
                    client: "10.0.0.2".into(),
                    hits: 1
                },
            ]
        );
    }

    #[test]
    fn test_rolling_window_drops_oldest_hour() {
        let stats = StatsAggregator::started_at(at("2024-03-01T00:00:00Z"));
        let now = at("2024-03-03T12:30:00Z");

        for i in 0..25 {
            let when = now - TimeDelta::hours(i);
            stats.record_download_at(when);
            stats.record_upload_at(when);
            stats.record_http_error_at(when);
        }

        let snap = stats.snapshot_at(now);
        assert_eq!(snap.last_24h_downloads, 24);
        assert_eq!(snap.last_24h_uploads, 24);
        assert_eq!(snap.last_24h_http_errors, 24);
        // Lifetime counters are unaffected
        assert_eq!(snap.downloads, 25);
        assert_eq!(stats.inner.read().hourly.len(), 24);
    }

    #[test]
    fn test_window_empties_after_a_day() {
        let stats = StatsAggregator::new();
        let then = at("2024-03-01T08:15:00Z");
        stats.record_upload_at(then);

        assert_eq!(stats.snapshot_at(then).last_24h_uploads, 1);

        let snap = stats.snapshot_at(then + TimeDelta::hours(25));
        assert_eq!(snap.last_24h_uploads, 0);
        assert_eq!(snap.uploads, 1);
        assert!(stats.inner.read().hourly.is_empty());
    }

    #[test]
    fn test_same_hour_shares_a_bucket() {
        let stats = StatsAggregator::new();
        stats.record_download_at(at("2024-03-01T08:00:00Z"));
        stats.record_download_at(at("2024-03-01T08:59:59Z"));
        stats.record_download_at(at("2024-03-01T09:00:00Z"));

        assert_eq!(stats.inner.read().hourly.len(), 2);
    }

    #[test]
    fn test_uptime() {
        let stats = StatsAggregator::started_at(Utc::now() - TimeDelta::seconds(5));
        assert!(stats.uptime() >= Duration::from_secs(5));
        assert!(StatsAggregator::new().uptime() < Duration::from_secs(5));
    }

    #[test]
    fn test_concurrent_updates() {
        let stats = Arc::new(StatsAggregator::new());
        let threads = 16;
        let iterations = 500;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..iterations {
                        stats.record_download();
                        stats.record_upload();
                        stats.record_http_error();
                        stats.record_rate_limit_hit("192.168.1.1");
                        let _ = stats.snapshot();
                        let _ = stats.uptime();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let expected = (threads * iterations) as u64;
        let snap = stats.snapshot();
        assert_eq!(snap.downloads, expected);
        assert_eq!(snap.uploads, expected);
        assert_eq!(snap.http_errors, expected);
        assert_eq!(snap.rate_limit_hits, expected);
        assert_eq!(snap.rate_limited_clients.len(), 1);
        assert_eq!(snap.rate_limited_clients[0].hits, expected);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = StatsAggregator::started_at(at("2024-03-01T00:00:00Z"));
        let json = serde_json::to_value(stats.snapshot()).unwrap();

        assert_eq!(json["downloads"], 0);
        assert_eq!(json["start_time"], "2024-03-01T00:00:00Z");
        assert!(json["rate_limited_clients"].as_array().unwrap().is_empty());
    }
}
