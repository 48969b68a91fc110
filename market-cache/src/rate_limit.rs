use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Window and request budget applied to one class of callers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub limit: u32,
}

impl RateLimitPolicy {
    pub fn new(window: Duration, limit: u32) -> Self {
        Self { window, limit }
    }

    /// General API routes: 60 requests per minute
    pub fn api_route() -> Self {
        Self::new(Duration::minutes(1), 60)
    }

    /// Quote lookups: 30 requests per minute
    pub fn quote_api() -> Self {
        Self::new(Duration::minutes(1), 30)
    }
}

/// Outcome of a rate limit check
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug)]
struct WindowRecord {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// In-memory fixed-window rate limiter keyed by caller identifier (IP,
/// user id, ...).
#[derive(Default)]
pub struct FixedWindowRateLimiter {
    records: DashMap<String, WindowRecord>,
}

impl FixedWindowRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, identifier: &str, window: Duration, max_requests: u32) -> RateLimitDecision {
        self.check_at(identifier, window, max_requests, Utc::now())
    }

    pub fn check_policy(&self, identifier: &str, policy: RateLimitPolicy) -> RateLimitDecision {
        self.check(identifier, policy.window, policy.limit)
    }

    /// Count one request from `identifier` at `now`. A window that ended
    /// strictly before `now` is replaced by a fresh one.
    pub fn check_at(
        &self,
        identifier: &str,
        window: Duration,
        max_requests: u32,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        match self.records.entry(identifier.to_string()) {
            Entry::Occupied(mut entry) if entry.get().reset_at >= now => {
                let record = entry.get_mut();
                record.count = record.count.saturating_add(1);

                if record.count > max_requests {
                    log::debug!("Rate limit exceeded for {}", identifier);
                    RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                        reset_at: record.reset_at,
                    }
                } else {
                    RateLimitDecision {
                        allowed: true,
                        remaining: max_requests - record.count,
                        reset_at: record.reset_at,
                    }
                }
            }
            entry => {
                let reset_at = now + window;
                let record = WindowRecord { count: 1, reset_at };
                match entry {
                    Entry::Occupied(mut occupied) => {
                        occupied.insert(record);
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(record);
                    }
                }
                RateLimitDecision {
                    allowed: true,
                    remaining: max_requests.saturating_sub(1),
                    reset_at,
                }
            }
        }
    }

    /// Drop windows that have ended
    pub fn cleanup(&self) {
        self.cleanup_at(Utc::now());
    }

    pub fn cleanup_at(&self, now: DateTime<Utc>) {
        let before = self.records.len();
        self.records.retain(|_, record| record.reset_at >= now);
        log::debug!(
            "Removed {} expired rate limit windows",
            before.saturating_sub(self.records.len())
        );
    }

    pub fn tracked(&self) -> usize {
        self.records.len()
    }
}

pub type SharedRateLimiter = Arc<FixedWindowRateLimiter>;

/// Sweep ended windows every `period`
pub fn spawn_cleanup(limiter: SharedRateLimiter, period: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            limiter.cleanup();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_budget() {
        let limiter = FixedWindowRateLimiter::new();
        let now = Utc::now();
        let window = Duration::minutes(1);

        let first = limiter.check_at("10.0.0.1", window, 3, now);
        assert!(first.allowed);
        assert_eq!(first.remaining, 2);
        assert_eq!(first.reset_at, now + window);

        assert_eq!(limiter.check_at("10.0.0.1", window, 3, now).remaining, 1);
        assert_eq!(limiter.check_at("10.0.0.1", window, 3, now).remaining, 0);

        let denied = limiter.check_at("10.0.0.1", window, 3, now);
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_at, now + window);
    }

    #[test]
    fn test_identifiers_are_independent() {
        let limiter = FixedWindowRateLimiter::new();
        let now = Utc::now();
        let window = Duration::minutes(1);

        assert!(limiter.check_at("a", window, 1, now).allowed);
        assert!(!limiter.check_at("a", window, 1, now).allowed);
        assert!(limiter.check_at("b", window, 1, now).allowed);
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let limiter = FixedWindowRateLimiter::new();
        let now = Utc::now();
        let window = Duration::minutes(1);

        assert!(limiter.check_at("ip", window, 1, now).allowed);
        assert!(!limiter.check_at("ip", window, 1, now).allowed);

        // still the same window exactly at reset_at
        assert!(!limiter.check_at("ip", window, 1, now + window).allowed);

        let later = now + window + Duration::milliseconds(1);
        let fresh = limiter.check_at("ip", window, 1, later);
        assert!(fresh.allowed);
        assert_eq!(fresh.reset_at, later + window);
    }

    #[test]
    fn test_cleanup_drops_ended_windows() {
        let limiter = FixedWindowRateLimiter::new();
        let now = Utc::now();
        limiter.check_at("old", Duration::seconds(1), 5, now - Duration::seconds(10));
        limiter.check_at("new", Duration::minutes(1), 5, now);

        limiter.cleanup_at(now);
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn test_policies() {
        assert_eq!(RateLimitPolicy::api_route().limit, 60);
        assert_eq!(RateLimitPolicy::quote_api().limit, 30);
        assert_eq!(RateLimitPolicy::quote_api().window, Duration::minutes(1));
    }
}
