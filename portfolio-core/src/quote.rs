use crate::error::{Error, Result};
use crate::symbol::Symbol;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use market_cache::fetch::parallel_fetch;
use market_cache::{CacheKey, SharedRequestCache};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

#[cfg(feature = "graphql")]
use async_graphql::SimpleObject;

/// Latest price snapshot of an instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub current_price: f64,
    #[serde(default)]
    pub change: f64,
    #[serde(default)]
    pub change_percent: f64,
    #[serde(default)]
    pub high: f64,
    #[serde(default)]
    pub low: f64,
    #[serde(default)]
    pub open: f64,
    #[serde(default)]
    pub previous_close: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(symbol: &Symbol, current_price: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            current_price,
            change: 0.0,
            change_percent: 0.0,
            high: 0.0,
            low: 0.0,
            open: 0.0,
            previous_close: 0.0,
            volume: 0.0,
            updated_at: Utc::now(),
        }
    }

    /// A quote with a non-positive price carries no information
    pub fn has_price(&self) -> bool {
        self.current_price.is_finite() && self.current_price > 0.0
    }
}

/// Anything able to price a symbol
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` when the source does not know the symbol
    async fn quote(&self, symbol: &Symbol) -> Result<Option<Quote>>;
}

/// Synchronous access to quotes that were already fetched
pub trait QuoteLookup {
    fn lookup_quote(&self, symbol: &str) -> Option<&Quote>;
}

impl QuoteLookup for HashMap<String, Quote> {
    fn lookup_quote(&self, symbol: &str) -> Option<&Quote> {
        self.get(symbol)
    }
}

/// In-process quote store fed by callers
#[derive(Default)]
pub struct QuoteBook {
    quotes: DashMap<String, Quote>,
}

impl QuoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, mut quote: Quote) -> Result<Quote> {
        let symbol = Symbol::parse(&quote.symbol)?;
        if !quote.has_price() {
            return Err(Error::invalid_field("currentPrice", "Price must be positive"));
        }
        quote.symbol = symbol.to_string();
        self.quotes.insert(quote.symbol.clone(), quote.clone());
        Ok(quote)
    }

    pub fn get(&self, symbol: &Symbol) -> Option<Quote> {
        self.quotes.get(symbol.as_str()).map(|q| q.clone())
    }

    pub fn remove(&self, symbol: &Symbol) -> Option<Quote> {
        self.quotes.remove(symbol.as_str()).map(|(_, q)| q)
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<_> = self.quotes.iter().map(|q| q.key().clone()).collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

#[async_trait]
impl QuoteSource for QuoteBook {
    fn name(&self) -> &str {
        "quote-book"
    }

    async fn quote(&self, symbol: &Symbol) -> Result<Option<Quote>> {
        Ok(self.get(symbol))
    }
}

/// Read-through cache in front of another source
pub struct CachedQuoteSource<S> {
    inner: S,
    cache: SharedRequestCache<Option<Quote>>,
    ttl: Duration,
}

impl<S: QuoteSource> CachedQuoteSource<S> {
    pub fn new(inner: S, cache: SharedRequestCache<Option<Quote>>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    pub fn cache_key(symbol: &Symbol) -> CacheKey {
        CacheKey::new(format!("quote:{}", symbol))
    }

    pub fn invalidate(&self, symbol: &Symbol) {
        self.cache.invalidate(&Self::cache_key(symbol));
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: QuoteSource> QuoteSource for CachedQuoteSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn quote(&self, symbol: &Symbol) -> Result<Option<Quote>> {
        let key = Self::cache_key(symbol);
        let quote = self
            .cache
            .get(&key, self.ttl, || self.inner.quote(symbol))
            .await?;
        Ok(quote)
    }
}

/// Asks every source at once and keeps the first answer in priority order
pub struct QuoteChain {
    sources: Vec<Arc<dyn QuoteSource>>,
}

impl QuoteChain {
    pub fn new(sources: Vec<Arc<dyn QuoteSource>>) -> Self {
        Self { sources }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl QuoteSource for QuoteChain {
    fn name(&self) -> &str {
        "quote-chain"
    }

    async fn quote(&self, symbol: &Symbol) -> Result<Option<Quote>> {
        let lookups: Vec<BoxFuture<'_, Result<Option<Quote>>>> = self
            .sources
            .iter()
            .map(|source| {
                async move {
                    source
                        .quote(symbol)
                        .await
                        .map(|quote| quote.filter(Quote::has_price))
                }
                .boxed()
            })
            .collect();

        Ok(parallel_fetch(lookups).await)
    }
}

/// Price a list of symbols one by one, pausing `delay` between lookups to
/// stay under upstream rate limits. Unknown or failing symbols are skipped.
pub async fn fetch_quotes(
    source: &dyn QuoteSource,
    symbols: &[Symbol],
    delay: StdDuration,
) -> HashMap<String, Quote> {
    let results = market_cache::fetch::batch_with_delay(
        symbols.to_vec(),
        |symbol| async move {
            match source.quote(&symbol).await {
                Ok(quote) => quote.filter(Quote::has_price),
                Err(err) => {
                    log::warn!("Quote lookup for {} via {} failed: {}", symbol, source.name(), err);
                    None
                }
            }
        },
        delay,
    )
    .await;

    results
        .into_iter()
        .flatten()
        .map(|quote| (quote.symbol.clone(), quote))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_cache::{CacheConfig, RequestCache};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        price: Option<f64>,
        fail: bool,
    }

    impl CountingSource {
        fn new(price: Option<f64>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                price,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                price: None,
                fail: true,
            }
        }
    }

    #[async_trait]
    impl QuoteSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        async fn quote(&self, symbol: &Symbol) -> Result<Option<Quote>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::external("counting", "503"));
            }
            Ok(self.price.map(|price| Quote::new(symbol, price)))
        }
    }

    fn sym(raw: &str) -> Symbol {
        Symbol::parse(raw).unwrap()
    }

    #[test]
    fn test_quote_book_validates() {
        let book = QuoteBook::new();
        let mut quote = Quote::new(&sym("AAPL"), 190.0);
        quote.symbol = "aapl".to_string();
        assert_eq!(book.upsert(quote).unwrap().symbol, "AAPL");
        assert!(book.get(&sym("AAPL")).is_some());

        let zero = Quote::new(&sym("MSFT"), 0.0);
        assert!(book.upsert(zero).is_err());
        assert_eq!(book.symbols(), vec!["AAPL".to_string()]);
    }

    #[tokio::test]
    async fn test_cached_source_hits_inner_once() {
        let cache = Arc::new(RequestCache::new(CacheConfig::default()));
        let cached = CachedQuoteSource::new(
            CountingSource::new(Some(10.0)),
            cache,
            Duration::seconds(60),
        );

        for _ in 0..3 {
            let quote = cached.quote(&sym("IBM")).await.unwrap().unwrap();
            assert_eq!(quote.current_price, 10.0);
        }
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);

        cached.invalidate(&sym("IBM"));
        cached.quote(&sym("IBM")).await.unwrap();
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_chain_prefers_first_source_with_a_price() {
        let chain = QuoteChain::new(vec![
            Arc::new(CountingSource::failing()),
            Arc::new(CountingSource::new(Some(0.0))),
            Arc::new(CountingSource::new(Some(42.0))),
            Arc::new(CountingSource::new(Some(43.0))),
        ]);
        let quote = chain.quote(&sym("KO")).await.unwrap().unwrap();
        assert_eq!(quote.current_price, 42.0);
    }

    #[tokio::test]
    async fn test_fetch_quotes_skips_unknown() {
        let book = QuoteBook::new();
        book.upsert(Quote::new(&sym("V"), 270.0)).unwrap();

        let quotes = fetch_quotes(&book, &[sym("V"), sym("MA")], StdDuration::ZERO).await;
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes["V"].current_price, 270.0);
    }
}
