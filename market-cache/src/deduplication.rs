use crate::error::CacheError;
use chrono::Duration;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::Future;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Configuration for request deduplication
#[derive(Clone, Debug)]
pub struct DeduplicationConfig {
    /// How long a waiter sticks around for an in-flight request. The
    /// request itself keeps its key until it completes or is dropped.
    pub request_timeout: Duration,
    /// Whether deduplication is enabled
    pub enabled: bool,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::seconds(30),
            enabled: true,
        }
    }
}

type Waiter<V> = oneshot::Sender<Result<V, CacheError>>;

struct PendingRequest<V> {
    id: u64,
    waiters: Vec<Waiter<V>>,
}

/// Request deduplication system.
/// When several identical requests come in, only the first one runs and
/// its outcome (value or error) is handed to every caller that waited on it.
pub struct RequestDeduplicator<V> {
    pending: DashMap<String, PendingRequest<V>>,
    next_id: AtomicU64,
    coalesced: AtomicUsize,
    config: DeduplicationConfig,
}

impl<V: Clone> RequestDeduplicator<V> {
    pub fn new(config: DeduplicationConfig) -> Self {
        Self {
            pending: DashMap::new(),
            next_id: AtomicU64::new(0),
            coalesced: AtomicUsize::new(0),
            config,
        }
    }

    /// Run `operation` unless the same key is already in flight, in which
    /// case wait for that request and share its result.
    pub async fn execute<F, Fut, E>(&self, key: &str, operation: F) -> Result<V, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Display,
    {
        if !self.config.enabled {
            return operation().await.map_err(CacheError::fetch);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let waiting = match self.pending.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let (tx, rx) = oneshot::channel();
                entry.get_mut().waiters.push(tx);
                Some(rx)
            }
            Entry::Vacant(entry) => {
                entry.insert(PendingRequest {
                    id,
                    waiters: Vec::new(),
                });
                None
            }
        };

        if let Some(rx) = waiting {
            log::debug!("Request already pending for key: {}", key);
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            let timeout = self
                .config
                .request_timeout
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);

            return match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(result)) => {
                    log::debug!("Received deduplicated result for key: {}", key);
                    result
                }
                Ok(Err(_)) => {
                    log::warn!("In-flight request abandoned for key: {}", key);
                    Err(CacheError::Abandoned)
                }
                Err(_) => {
                    log::warn!("Request timeout for key: {}", key);
                    Err(CacheError::Timeout)
                }
            };
        }

        log::debug!("Executing new request for key: {}", key);
        let mut in_flight = InFlight {
            pending: &self.pending,
            key,
            id,
            finished: false,
        };

        let result = operation().await.map_err(CacheError::fetch);
        in_flight.finish(&result);
        result
    }

    /// Drop the pending marker for `key`, releasing its waiters.
    pub fn forget(&self, key: &str) {
        if self.pending.remove(key).is_some() {
            log::debug!("Forgot in-flight request for key: {}", key);
        }
    }

    /// Whether a request for `key` is currently in flight
    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    /// Get statistics about pending requests
    pub fn stats(&self) -> DeduplicationStats {
        let pending_requests = self.pending.len();
        let total_waiters = self
            .pending
            .iter()
            .map(|entry| entry.value().waiters.len())
            .sum();

        DeduplicationStats {
            pending_requests,
            total_waiters,
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }

    /// Clear all pending requests
    pub fn clear(&self) {
        self.pending.clear();
        log::info!("Request deduplicator cleared");
    }
}

/// Marker for the request this task is executing. Dropping it before
/// [`InFlight::finish`] (e.g. the leader future was cancelled) frees the key
/// and releases the waiters.
struct InFlight<'a, V> {
    pending: &'a DashMap<String, PendingRequest<V>>,
    key: &'a str,
    id: u64,
    finished: bool,
}

impl<V: Clone> InFlight<'_, V> {
    fn finish(&mut self, result: &Result<V, CacheError>) {
        self.finished = true;
        if let Some((_, request)) = self.pending.remove_if(self.key, |_, r| r.id == self.id) {
            log::debug!(
                "Notifying {} waiters for key: {}",
                request.waiters.len(),
                self.key
            );
            for waiter in request.waiters {
                let _ = waiter.send(result.clone());
            }
        }
    }
}

impl<V> Drop for InFlight<'_, V> {
    fn drop(&mut self) {
        if !self.finished
            && self
                .pending
                .remove_if(self.key, |_, r| r.id == self.id)
                .is_some()
        {
            log::warn!("Request for key {} dropped before completion", self.key);
        }
    }
}

/// Statistics for request deduplication
#[derive(Debug, Clone, Default)]
pub struct DeduplicationStats {
    pub pending_requests: usize,
    pub total_waiters: usize,
    /// Callers served by somebody else's in-flight request since start
    pub coalesced: usize,
}

/// Thread-safe wrapper for the deduplicator
pub type SharedRequestDeduplicator<V> = Arc<RequestDeduplicator<V>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn test_request_deduplication() {
        let deduplicator: SharedRequestDeduplicator<u32> =
            Arc::new(RequestDeduplicator::new(DeduplicationConfig::default()));
        let execution_count = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..5 {
            let deduplicator = deduplicator.clone();
            let execution_count = execution_count.clone();

            handles.push(tokio::spawn(async move {
                deduplicator
                    .execute("quote:AAPL", || async move {
                        execution_count.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(StdDuration::from_millis(100)).await;
                        Ok::<_, String>(42)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 42);
        }

        assert_eq!(execution_count.load(Ordering::SeqCst), 1);
        assert_eq!(deduplicator.stats().coalesced, 4);
        assert_eq!(deduplicator.stats().pending_requests, 0);
    }

    #[tokio::test]
    async fn test_different_keys_not_deduplicated() {
        let deduplicator: SharedRequestDeduplicator<u32> =
            Arc::new(RequestDeduplicator::new(DeduplicationConfig::default()));
        let execution_count = Arc::new(AtomicUsize::new(0));

        let first = {
            let deduplicator = deduplicator.clone();
            let execution_count = execution_count.clone();
            tokio::spawn(async move {
                deduplicator
                    .execute("quote:AAPL", || async move {
                        execution_count.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, String>(1)
                    })
                    .await
            })
        };
        let second = {
            let deduplicator = deduplicator.clone();
            let execution_count = execution_count.clone();
            tokio::spawn(async move {
                deduplicator
                    .execute("quote:MSFT", || async move {
                        execution_count.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, String>(2)
                    })
                    .await
            })
        };

        assert_eq!(first.await.unwrap().unwrap(), 1);
        assert_eq!(second.await.unwrap().unwrap(), 2);
        assert_eq!(execution_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter() {
        let deduplicator: SharedRequestDeduplicator<u32> =
            Arc::new(RequestDeduplicator::new(DeduplicationConfig::default()));

        let mut handles = vec![];
        for _ in 0..3 {
            let deduplicator = deduplicator.clone();
            handles.push(tokio::spawn(async move {
                deduplicator
                    .execute("profile:TSLA", || async {
                        tokio::time::sleep(StdDuration::from_millis(50)).await;
                        Err::<u32, _>("upstream returned 503")
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(
                handle.await.unwrap(),
                Err(CacheError::Fetch("upstream returned 503".to_string()))
            );
        }
        assert!(!deduplicator.is_pending("profile:TSLA"));
    }

    #[tokio::test]
    async fn test_cancelled_leader_frees_key() {
        let deduplicator: SharedRequestDeduplicator<u32> =
            Arc::new(RequestDeduplicator::new(DeduplicationConfig::default()));

        let leader = {
            let deduplicator = deduplicator.clone();
            tokio::spawn(async move {
                deduplicator
                    .execute("news:NVDA", || async {
                        tokio::time::sleep(StdDuration::from_secs(10)).await;
                        Ok::<_, String>(1)
                    })
                    .await
            })
        };
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert!(deduplicator.is_pending("news:NVDA"));

        leader.abort();
        let _ = leader.await;
        assert!(!deduplicator.is_pending("news:NVDA"));

        let value = deduplicator
            .execute("news:NVDA", || async { Ok::<_, String>(7) })
            .await;
        assert_eq!(value, Ok(7));
    }

    fn short_timeout() -> DeduplicationConfig {
        DeduplicationConfig {
            request_timeout: Duration::milliseconds(50),
            ..DeduplicationConfig::default()
        }
    }

    #[tokio::test]
    async fn test_waiter_times_out_while_leader_completes() {
        let deduplicator: SharedRequestDeduplicator<u32> =
            Arc::new(RequestDeduplicator::new(short_timeout()));

        let leader = {
            let deduplicator = deduplicator.clone();
            tokio::spawn(async move {
                deduplicator
                    .execute("quote:AMZN", || async {
                        tokio::time::sleep(StdDuration::from_millis(200)).await;
                        Ok::<_, String>(5)
                    })
                    .await
            })
        };
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        let waiter = deduplicator
            .execute("quote:AMZN", || async { Ok::<_, String>(99) })
            .await;
        assert_eq!(waiter, Err(CacheError::Timeout));
        assert_eq!(leader.await.unwrap(), Ok(5));
        assert!(!deduplicator.is_pending("quote:AMZN"));
    }

    #[tokio::test]
    async fn test_slow_leader_keeps_key_past_timeout() {
        let deduplicator: SharedRequestDeduplicator<u32> =
            Arc::new(RequestDeduplicator::new(short_timeout()));
        let running = Arc::new(AtomicUsize::new(0));
        let max_running = Arc::new(AtomicUsize::new(0));

        let spawn_fetch = |delay_ms: u64| {
            let deduplicator = deduplicator.clone();
            let running = running.clone();
            let max_running = max_running.clone();
            tokio::spawn(async move {
                tokio::time::sleep(StdDuration::from_millis(delay_ms)).await;
                deduplicator
                    .execute("metrics:META", || async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        max_running.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(StdDuration::from_millis(300)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, String>(1)
                    })
                    .await
            })
        };

        let first = spawn_fetch(0);
        // arrives well after the waiter timeout, while the first fetch still runs
        let second = spawn_fetch(120);

        assert_eq!(second.await.unwrap(), Err(CacheError::Timeout));
        assert_eq!(first.await.unwrap(), Ok(1));
        assert_eq!(max_running.load(Ordering::SeqCst), 1);
    }
}
