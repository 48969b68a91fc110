use std::fmt::Display;

/// Errors surfaced by [`RequestCache`](crate::RequestCache) and
/// [`RequestDeduplicator`](crate::RequestDeduplicator).
///
/// The error is cloneable because a single failed fetch is reported to every
/// caller that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("timed out waiting for in-flight request")]
    Timeout,
    #[error("in-flight request was abandoned")]
    Abandoned,
}

impl CacheError {
    pub fn fetch(err: impl Display) -> Self {
        CacheError::Fetch(err.to_string())
    }
}

/// Errors raised by a [`SessionStore`](crate::session::SessionStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session entry is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}
