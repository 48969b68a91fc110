use super::super::get_context;
use async_graphql::{Context, Object, SimpleObject};
use market_cache::CacheStats;
use portfolio_core::store::StoreStats;
use serde::Serialize;

#[derive(Default)]
pub struct CacheStatsQuery;

#[derive(SimpleObject, Serialize)]
pub struct CacheStatsResponse {
    pub quote_cache: CacheStats,
    pub screener_cache: CacheStats,
    pub funds_cache: CacheStats,
    pub cache_enabled: bool,
    pub rate_limit_windows: usize,
    pub store: StoreStats,
}

#[Object]
impl CacheStatsQuery {
    /// Get current cache statistics
    async fn cache_stats<'ctx>(&self, context: &Context<'ctx>) -> CacheStatsResponse {
        let ctx = get_context(context);

        CacheStatsResponse {
            quote_cache: ctx.quote_cache().stats(),
            screener_cache: ctx.screener_cache().stats(),
            funds_cache: ctx.funds_cache().stats(),
            cache_enabled: ctx.config().cache().cache_config().enabled,
            rate_limit_windows: ctx.rate_limiter().tracked(),
            store: ctx.store().stats(),
        }
    }

    /// Clear the cache (useful for debugging/admin)
    async fn clear_cache<'ctx>(&self, context: &Context<'ctx>) -> bool {
        let ctx = get_context(context);
        ctx.clear_caches();
        true
    }
}
