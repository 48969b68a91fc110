use getset::Getters;
use log::{info, warn};
use market_cache::session::{portfolio_key, SessionStore};
use market_cache::{
    rate_limit, ttl, CacheKey, FileSessionStore, FixedWindowRateLimiter, MemorySessionStore,
    RequestCache, SessionCache, SharedRateLimiter, SharedRequestCache,
};
use portfolio_core::funds::{rank_funds, FundCategory, FundRecord, FundSource};
use portfolio_core::portfolio::performance;
use portfolio_core::quote::{fetch_quotes, QuoteSource};
use portfolio_core::screener::{screen, ScreenerFilters, ScreenerRow, ScreenerUniverse};
use portfolio_core::{
    CachedQuoteSource, Error, PortfolioPerformance, PortfolioStore, Quote, QuoteBook, QuoteChain,
    Result, Symbol,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;

use super::config::Config;
use crate::sources::HttpFundSource;

pub type Session = SessionCache<Box<dyn SessionStore>>;

#[derive(Getters)]
#[get = "pub"]
pub struct Context {
    config: Config,
    store: PortfolioStore,
    quote_book: Arc<QuoteBook>,
    quotes: CachedQuoteSource<QuoteChain>,
    quote_cache: SharedRequestCache<Option<Quote>>,
    universe: ScreenerUniverse,
    screener_cache: SharedRequestCache<Vec<ScreenerRow>>,
    fund_sources: Vec<Arc<dyn FundSource>>,
    funds_cache: SharedRequestCache<Vec<FundRecord>>,
    rate_limiter: SharedRateLimiter,
    session: Session,
}

impl Context {
    pub fn new(config: Config) -> Self {
        let cache_config = config.cache().cache_config();

        let quote_book = Arc::new(QuoteBook::new());
        let quote_cache = Arc::new(RequestCache::new(cache_config.clone()));
        let chain = QuoteChain::new(vec![quote_book.clone() as Arc<dyn QuoteSource>]);
        let quotes = CachedQuoteSource::new(chain, quote_cache.clone(), ttl::realtime());

        let fund_sources = HttpFundSource::from_configs(config.fund_sources());
        info!(
            "Initialized request caches (TTL: {}s, Max entries: {}) with {} fund source(s)",
            cache_config.default_ttl.num_seconds(),
            cache_config.max_entries,
            fund_sources.len()
        );

        Self {
            store: PortfolioStore::new(),
            quote_book,
            quotes,
            quote_cache,
            universe: ScreenerUniverse::new(),
            screener_cache: Arc::new(RequestCache::new(cache_config.clone())),
            fund_sources,
            funds_cache: Arc::new(RequestCache::new(cache_config)),
            rate_limiter: Arc::new(FixedWindowRateLimiter::new()),
            session: SessionCache::new(session_store(&config)),
            config,
        }
    }

    /// Sweep stale cache entries and ended rate limit windows in the
    /// background
    pub fn spawn_maintenance(&self) -> Vec<JoinHandle<()>> {
        let period = self
            .config
            .cache()
            .cache_config()
            .cleanup_interval
            .to_std()
            .unwrap_or(StdDuration::from_secs(300));

        vec![
            market_cache::spawn_cleanup(self.quote_cache.clone(), ttl::sweep()),
            market_cache::spawn_cleanup(self.screener_cache.clone(), ttl::sweep()),
            market_cache::spawn_cleanup(self.funds_cache.clone(), ttl::semi_static()),
            rate_limit::spawn_cleanup(self.rate_limiter.clone(), period),
        ]
    }

    /// Whether quotes can be served from somewhere
    pub fn has_quote_source(&self) -> bool {
        *self.config.quote_source_configured() || !self.quote_book.is_empty()
    }

    pub async fn quote(&self, symbol: &Symbol) -> Result<Option<Quote>> {
        self.quotes.quote(symbol).await
    }

    pub async fn quotes_for(&self, symbols: &[Symbol]) -> HashMap<String, Quote> {
        fetch_quotes(&self.quotes, symbols, StdDuration::ZERO).await
    }

    /// Record a fresh quote, drop what was cached for it and fire the
    /// alerts it satisfies
    pub fn upsert_quote(&self, quote: Quote) -> Result<Quote> {
        let symbol = Symbol::parse(&quote.symbol)?;
        let quote = self.quote_book.upsert(quote)?;
        self.quotes.invalidate(&symbol);
        self.screener_cache.clear();

        for alert in self.store.trigger_alerts(&quote) {
            info!(
                "Alert {} ({}) fired for {} at {}",
                alert.id, alert.alert_type, alert.symbol, quote.current_price
            );
        }
        Ok(quote)
    }

    pub async fn portfolio_performance(
        &self,
        user_id: &str,
        portfolio_id: &str,
    ) -> Result<PortfolioPerformance> {
        let portfolio = self.store.get_portfolio(user_id, portfolio_id)?;
        let quotes = self.quotes_for(&portfolio.symbols()).await;
        let result = performance(&portfolio, &quotes, self.has_quote_source());

        self.session
            .store(&performance_key(user_id, portfolio_id), &result);
        Ok(result)
    }

    /// Last performance computed for the portfolio, while still fresh
    pub fn cached_performance(&self, user_id: &str, portfolio_id: &str) -> Option<PortfolioPerformance> {
        self.session
            .load(&performance_key(user_id, portfolio_id))
            .data
    }

    pub async fn screen(&self, filters: &ScreenerFilters) -> Result<Vec<ScreenerRow>> {
        let raw = serde_json::to_string(filters).map_err(|err| Error::Unknown(err.to_string()))?;
        let key = CacheKey::hashed("screener", [raw]);

        let rows = self
            .screener_cache
            .get(&key, ttl::realtime(), || async {
                let quotes = self.quotes_for(&self.universe.symbols()).await;
                Ok::<_, Error>(screen(self.universe.rows(&quotes), filters))
            })
            .await?;
        Ok(rows)
    }

    pub async fn ranked_funds(&self, category: FundCategory, limit: usize) -> Result<Vec<FundRecord>> {
        let key = CacheKey::new(format!("funds:{}:{}", category, limit));
        let funds = self
            .funds_cache
            .get(&key, ttl::semi_static(), || async {
                Ok::<_, Error>(rank_funds(&self.fund_sources, category, limit).await)
            })
            .await?;
        Ok(funds)
    }

    /// Drop everything cached from market data
    pub fn clear_caches(&self) {
        self.quote_cache.clear();
        self.screener_cache.clear();
        self.funds_cache.clear();
        info!("Cleared request caches");
    }
}

fn performance_key(user_id: &str, portfolio_id: &str) -> String {
    portfolio_key(Some(user_id), &format!("performance-{}", portfolio_id))
}

fn session_store(config: &Config) -> Box<dyn SessionStore> {
    if let Some(dir) = config.session_dir() {
        match FileSessionStore::new(dir) {
            Ok(store) => return Box::new(store),
            Err(err) => warn!(
                "Session directory {} unusable ({}), keeping sessions in memory",
                dir.display(),
                err
            ),
        }
    }
    Box::new(MemorySessionStore::new())
}

pub type ContextPointer = Arc<Context>;
