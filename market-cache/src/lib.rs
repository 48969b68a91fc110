// Request caching, deduplication and rate limiting for market data lookups

pub mod cache;
pub mod deduplication;
mod error;
pub mod fetch;
pub mod rate_limit;
pub mod session;


// Re-export for convenience
pub use cache::{
    spawn_cleanup, CacheConfig, CacheKey, CacheStats, CachedResult, RequestCache,
    SharedRequestCache,
};
pub use deduplication::{
    DeduplicationConfig, DeduplicationStats, RequestDeduplicator, SharedRequestDeduplicator,
};
pub use error::{CacheError, SessionError};
pub use rate_limit::{FixedWindowRateLimiter, RateLimitDecision, RateLimitPolicy, SharedRateLimiter};
pub use session::{FileSessionStore, MemorySessionStore, SessionCache, SessionLoad, SessionStore};

/// TTLs used for the different kinds of market data
pub mod ttl {
    use chrono::Duration;

    /// Prices and news
    pub fn realtime() -> Duration {
        Duration::seconds(60)
    }

    /// Profiles and metrics
    pub fn semi_static() -> Duration {
        Duration::seconds(3600)
    }

    /// Company information
    pub fn static_data() -> Duration {
        Duration::seconds(21600)
    }

    /// Age at which the background sweeper drops entries
    pub fn sweep() -> Duration {
        Duration::seconds(300)
    }
}
