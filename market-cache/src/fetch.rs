//! Helpers for fanning requests out to several data sources.
//!
//! Every source is a future yielding `Result<Option<T>, E>`: `Ok(None)` means
//! the source answered but had nothing, errors are logged and treated as
//! `None`.

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::Future;
use std::fmt::Display;
use std::time::Duration;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;

/// Run all sources concurrently and return the first non-empty result in
/// input order.
pub async fn parallel_fetch<T, E, Fut>(sources: Vec<Fut>) -> Option<T>
where
    Fut: Future<Output = Result<Option<T>, E>>,
    E: Display,
{
    parallel_fetch_with(sources, |results| results.into_iter().flatten().next()).await
}

/// Run all sources concurrently and hand every outcome to `combiner`.
pub async fn parallel_fetch_with<T, E, Fut, C>(sources: Vec<Fut>, combiner: C) -> Option<T>
where
    Fut: Future<Output = Result<Option<T>, E>>,
    E: Display,
    C: FnOnce(Vec<Option<T>>) -> Option<T>,
{
    let results = join_all(sources)
        .await
        .into_iter()
        .map(|result| {
            result.unwrap_or_else(|err| {
                log::warn!("Parallel fetch error: {}", err);
                None
            })
        })
        .collect();

    combiner(results)
}

/// Return whichever source produces a non-empty result first, or
/// `fallback` when none does.
pub async fn race_data_sources<T, E, Fut>(sources: Vec<Fut>, fallback: Option<T>) -> Option<T>
where
    Fut: Future<Output = Result<Option<T>, E>>,
    E: Display,
{
    let mut pending: FuturesUnordered<Fut> = sources.into_iter().collect();

    while let Some(result) = pending.next().await {
        match result {
            Ok(Some(value)) => return Some(value),
            Ok(None) => {}
            Err(err) => log::warn!("Data source error: {}", err),
        }
    }

    fallback
}

/// `None` if `fetch` fails or does not finish within `timeout`.
pub async fn fetch_with_timeout<T, E, Fut>(fetch: Fut, timeout: Duration) -> Option<T>
where
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, fetch).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            log::warn!("Fetch with timeout error: {}", err);
            None
        }
        Err(_) => {
            log::debug!("Fetch timed out after {:?}", timeout);
            None
        }
    }
}

/// Process `items` one after the other, sleeping `delay` between calls.
pub async fn batch_with_delay<I, T, F, Fut>(items: Vec<I>, mut processor: F, delay: Duration) -> Vec<T>
where
    F: FnMut(I) -> Fut,
    Fut: Future<Output = T>,
{
    let total = items.len();
    let mut results = Vec::with_capacity(total);

    for (index, item) in items.into_iter().enumerate() {
        results.push(processor(item).await);

        if index + 1 < total {
            tokio::time::sleep(delay).await;
        }
    }

    results
}

/// Retry `operation` up to `max_attempts` times while `is_retryable` says
/// so, sleeping `backoff * attempt` between tries.
pub async fn fetch_with_retry<T, E, F, Fut, R>(
    max_attempts: usize,
    backoff: Duration,
    is_retryable: R,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: Display,
{
    let strategy = FixedInterval::new(backoff)
        .zip(1u32..)
        .map(|(delay, attempt)| delay * attempt)
        .take(max_attempts.saturating_sub(1));

    RetryIf::spawn(strategy, operation, |err: &E| {
        let retry = is_retryable(err);
        if retry {
            log::debug!("Fetch failed ({}), retrying", err);
        }
        retry
    })
    .await
}
