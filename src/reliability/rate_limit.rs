//! Per-client token-bucket admission.
//!
//! Each client host gets its own bucket holding at most `burst` tokens and
//! refilling at `per_second` tokens per second. A bucket is created on the
//! first request from a new client and starts full. Loopback clients are
//! always admitted and never get a bucket.
//!
//! Buckets are never evicted, so memory grows with the number of distinct
//! clients seen since startup.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ephemeral_store::reliability::{Admission, RateLimiter};
//!
//! let limiter = RateLimiter::new(10.0, 5)?;
//! match limiter.admit("203.0.113.7:51234")? {
//!     Admission::Allow => { /* serve */ }
//!     Admission::Deny => { /* 429 */ }
//! }
//! ```

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota};
use tracing::debug;

use crate::error::{Error, Result};

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A token was available (or the client is exempt).
    Allow,
    /// The client's bucket is empty.
    Deny,
}

impl Admission {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Keyed token-bucket limiter.
pub struct RateLimiter {
    buckets: DefaultKeyedRateLimiter<String>,
    per_second: f64,
    burst: u32,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("per_second", &self.per_second)
            .field("burst", &self.burst)
            .field("tracked_clients", &self.tracked_clients())
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter refilling `per_second` tokens per second into
    /// buckets of capacity `burst`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the rate is not a positive finite number
    /// or the burst is zero.
    pub fn new(per_second: f64, burst: u32) -> Result<Self> {
        if !per_second.is_finite() || per_second <= 0.0 {
            return Err(Error::Config(format!(
                "rate limit must be a positive number of requests per second, got {per_second}"
            )));
        }
        let capacity = NonZeroU32::new(burst)
            .ok_or_else(|| Error::Config("rate limit burst must be at least 1".to_string()))?;

        let replenish = Duration::try_from_secs_f64(per_second.recip())
            .map_err(|e| Error::Config(format!("invalid rate limit {per_second}: {e}")))?;
        let quota = Quota::with_period(replenish)
            .ok_or_else(|| Error::Config(format!("rate limit {per_second}/s is too high")))?
            .allow_burst(capacity);

        Ok(Self {
            buckets: governor::RateLimiter::keyed(quota),
            per_second,
            burst,
        })
    }

    /// Refill rate in tokens per second.
    pub fn per_second(&self) -> f64 {
        self.per_second
    }

    /// Bucket capacity.
    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Check a client given as `host:port` text.
    ///
    /// The port is ignored. A host that is not an IP literal is keyed on its
    /// text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClientAddressUnparseable`] if `client` cannot be
    /// split into host and port.
    pub fn admit(&self, client: &str) -> Result<Admission> {
        let host = split_host(client).ok_or_else(|| Error::ClientAddressUnparseable {
            addr: client.to_string(),
        })?;
        match host.parse::<IpAddr>() {
            Ok(ip) => Ok(self.admit_ip(ip)),
            Err(_) => Ok(self.check(host.to_string())),
        }
    }

    /// Check an already parsed peer address.
    pub fn admit_addr(&self, addr: SocketAddr) -> Admission {
        self.admit_ip(addr.ip())
    }

    /// Check a client IP. Loopback addresses are always allowed.
    pub fn admit_ip(&self, ip: IpAddr) -> Admission {
        if ip.is_loopback() {
            return Admission::Allow;
        }
        self.check(ip.to_string())
    }

    fn check(&self, client: String) -> Admission {
        match self.buckets.check_key(&client) {
            Ok(()) => Admission::Allow,
            Err(_) => {
                debug!(client = %client, "Bucket empty");
                Admission::Deny
            },
        }
    }

    /// Number of clients with a bucket.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Host part of `host:port` or `[v6]:port`. `None` when there is no port
/// separator or an unbracketed host holds a colon.
fn split_host(client: &str) -> Option<&str> {
    if let Some(rest) = client.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        return tail.starts_with(':').then_some(host);
    }
    let (host, _port) = client.rsplit_once(':')?;
    (!host.contains(':')).then_some(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_burst_then_deny() {
        let limiter = RateLimiter::new(1.0, 3).unwrap();

        for _ in 0..3 {
            assert_eq!(limiter.admit("203.0.113.7:4000").unwrap(), Admission::Allow);
        }
        assert_eq!(limiter.admit("203.0.113.7:4000").unwrap(), Admission::Deny);
    }

    #[test]
    fn test_port_does_not_matter() {
        let limiter = RateLimiter::new(1.0, 1).unwrap();

        assert!(limiter.admit("203.0.113.7:4000").unwrap().is_allowed());
        assert!(!limiter.admit("203.0.113.7:4001").unwrap().is_allowed());
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(1.0, 1).unwrap();

        assert!(limiter.admit("203.0.113.7:1").unwrap().is_allowed());
        assert!(!limiter.admit("203.0.113.7:1").unwrap().is_allowed());
        assert!(limiter.admit("198.51.100.2:1").unwrap().is_allowed());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_refill() {
        let limiter = RateLimiter::new(20.0, 1).unwrap();
        let client = "203.0.113.9:80";

        assert!(limiter.admit(client).unwrap().is_allowed());
        assert!(!limiter.admit(client).unwrap().is_allowed());

        // One token every 50ms
        std::thread::sleep(Duration::from_millis(80));
        assert!(limiter.admit(client).unwrap().is_allowed());
    }

    #[test]
    fn test_loopback_is_exempt() {
        let limiter = RateLimiter::new(1.0, 1).unwrap();

        for _ in 0..100 {
            assert!(limiter.admit("127.0.0.1:8080").unwrap().is_allowed());
            assert!(limiter.admit("[::1]:8080").unwrap().is_allowed());
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn test_ipv6_client() {
        let limiter = RateLimiter::new(1.0, 1).unwrap();

        assert!(limiter.admit("[2001:db8::1]:443").unwrap().is_allowed());
        assert!(!limiter.admit("[2001:db8::1]:443").unwrap().is_allowed());
    }

    #[test]
    fn test_malformed_client() {
        let limiter = RateLimiter::new(1.0, 1).unwrap();

        for bad in ["", "203.0.113.7", "[::1", "[::1]", "2001:db8::1:80"] {
            assert!(
                matches!(
                    limiter.admit(bad),
                    Err(Error::ClientAddressUnparseable { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_hostname_client_is_keyed_on_host() {
        let limiter = RateLimiter::new(1.0, 1).unwrap();

        assert!(limiter.admit("not-an-address:80").unwrap().is_allowed());
        assert!(!limiter.admit("not-an-address:81").unwrap().is_allowed());
        assert!(limiter.admit("other-host:80").unwrap().is_allowed());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_split_host() {
        assert_eq!(split_host("203.0.113.7:80"), Some("203.0.113.7"));
        assert_eq!(split_host("[2001:db8::1]:443"), Some("2001:db8::1"));
        assert_eq!(split_host("example.test:8080"), Some("example.test"));
        assert_eq!(split_host("example.test"), None);
        assert_eq!(split_host("[::1]x"), None);
    }

    #[test]
    fn test_admit_addr() {
        let limiter = RateLimiter::new(1.0, 2).unwrap();
        let addr = SocketAddr::from((Ipv4Addr::new(192, 0, 2, 1), 9000));

        assert_eq!(limiter.admit_addr(addr), Admission::Allow);
        assert_eq!(limiter.admit_addr(addr), Admission::Allow);
        assert_eq!(limiter.admit_addr(addr), Admission::Deny);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(RateLimiter::new(0.0, 5), Err(Error::Config(_))));
        assert!(matches!(RateLimiter::new(-1.0, 5), Err(Error::Config(_))));
        assert!(matches!(
            RateLimiter::new(f64::NAN, 5),
            Err(Error::Config(_))
        ));
        assert!(matches!(RateLimiter::new(10.0, 0), Err(Error::Config(_))));
    }

    #[test]
    fn test_concurrent_admission_respects_burst() {
        let limiter = std::sync::Arc::new(RateLimiter::new(0.001, 10).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..5)
                        .filter(|_| limiter.admit("192.0.2.44:1").unwrap().is_allowed())
                        .count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 10);
    }
}
