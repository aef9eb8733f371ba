//! Per-client sliding-window rate limiting.
//!
//! Each client IP keeps a log of the instants its allowed requests arrived.
//! A request is allowed while fewer than `max_requests` entries fall inside
//! the last `window`; denied requests are not logged, so a client that backs
//! off recovers as soon as its oldest entries age out.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::json;
use tracing::warn;

use super::Middleware;
use crate::config::RateLimiterConfig;
use crate::error::Fault;
use crate::request::Request;

/// Checks between sweeps of idle clients.
const PRUNE_EVERY: u64 = 1024;

pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    code: String,
    message: String,
    logs: DashMap<String, VecDeque<Instant>>,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        let defaults = RateLimiterConfig::default();
        Self {
            max_requests,
            window,
            code: defaults.code,
            message: defaults.message,
            logs: DashMap::new(),
            checks: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &RateLimiterConfig) -> Self {
        Self {
            code: config.code.clone(),
            message: config.message.clone(),
            ..Self::new(config.max_requests, Duration::from_millis(config.window_ms))
        }
    }

    pub fn is_allowed(&self, ip: &str) -> bool {
        self.is_allowed_at(ip, Instant::now())
    }

    /// The filter-count-push sequence runs under the entry's shard lock, so
    /// concurrent requests from one client cannot both take the last slot.
    pub fn is_allowed_at(&self, ip: &str, now: Instant) -> bool {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune(now);
        }

        let mut log = self.logs.entry(ip.to_owned()).or_default();
        while log.front().is_some_and(|&t| now.saturating_duration_since(t) >= self.window) {
            log.pop_front();
        }
        if log.len() < self.max_requests {
            log.push_back(now);
            true
        } else {
            false
        }
    }

    /// Forgets every client.
    pub fn reset(&self) {
        self.logs.clear();
    }

    /// Logged request instants for `ip`, oldest first.
    pub fn requests_for(&self, ip: &str) -> Vec<Instant> {
        self.logs.get(ip).map(|log| log.iter().copied().collect()).unwrap_or_default()
    }

    /// Drops clients with no request inside the window.
    fn prune(&self, now: Instant) {
        self.logs.retain(|_, log| {
            log.back().is_some_and(|&t| now.saturating_duration_since(t) < self.window)
        });
    }
}

impl Middleware for RateLimiter {
    fn name(&self) -> &'static str {
        "rate_limiter"
    }

    fn before(&self, req: &mut Request) -> Result<(), Fault> {
        let ip = req.ip();
        if self.is_allowed(&ip) {
            return Ok(());
        }
        warn!(client = %ip, path = req.path(), "rate limit exceeded");
        Err(Fault::too_many_requests(&json!({
            "status": false,
            "code": self.code,
            "message": self.message,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_slides() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        let start = Instant::now();
        assert!(limiter.is_allowed_at("1.1.1.1", start));
        assert!(limiter.is_allowed_at("1.1.1.1", start + Duration::from_secs(1)));
        assert!(!limiter.is_allowed_at("1.1.1.1", start + Duration::from_secs(2)));
        assert!(limiter.is_allowed_at("2.2.2.2", start + Duration::from_secs(2)));

        // The first entry ages out; the denied attempt was never logged.
        assert!(limiter.is_allowed_at("1.1.1.1", start + Duration::from_secs(10)));
        assert_eq!(limiter.requests_for("1.1.1.1").len(), 2);
    }

    #[test]
    fn reset_forgets_clients() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.is_allowed("1.1.1.1"));
        assert!(!limiter.is_allowed("1.1.1.1"));
        limiter.reset();
        assert!(limiter.requests_for("1.1.1.1").is_empty());
        assert!(limiter.is_allowed("1.1.1.1"));
    }

    #[test]
    fn prune_drops_idle_clients() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1));
        let start = Instant::now();
        limiter.is_allowed_at("1.1.1.1", start);
        limiter.prune(start + Duration::from_secs(2));
        assert!(limiter.requests_for("1.1.1.1").is_empty());
    }
}
