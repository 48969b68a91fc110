mod analysis;
mod cache_stats;
mod funds;
mod market;
mod portfolio;

use analysis::AnalysisQuery;
use async_graphql::MergedObject;
use cache_stats::CacheStatsQuery;
use funds::FundsQuery;
use market::MarketQuery;
use portfolio::PortfolioQuery;

#[derive(MergedObject, Default)]
pub struct Query(
    CacheStatsQuery,
    PortfolioQuery,
    MarketQuery,
    FundsQuery,
    AnalysisQuery,
);
