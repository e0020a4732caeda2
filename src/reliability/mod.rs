//! Admission control for inbound requests.

pub mod rate_limit;

pub use rate_limit::{Admission, RateLimiter};
