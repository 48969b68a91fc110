mod alerts;
mod market;
mod portfolio;
mod screener;
mod watchlist;

use alerts::AlertsMutation;
use async_graphql::MergedObject;
use market::MarketMutation;
use portfolio::PortfolioMutation;
use screener::ScreenerMutation;
use watchlist::WatchlistMutation;

#[derive(MergedObject, Default)]
pub struct Mutation(
    PortfolioMutation,
    WatchlistMutation,
    AlertsMutation,
    ScreenerMutation,
    MarketMutation,
);
