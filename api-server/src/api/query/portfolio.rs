use super::super::{current_user, get_context, GraphQLResult};
use async_graphql::{Context, Object, Result};
use portfolio_core::watchlist::WatchlistItem;
use portfolio_core::{Portfolio, PortfolioPerformance};

#[derive(Default)]
pub struct PortfolioQuery;

#[Object]
impl PortfolioQuery {
    /// Portfolios of the current user, newest first
    async fn portfolios<'ctx>(&self, context: &Context<'ctx>) -> Result<Vec<Portfolio>> {
        let user = current_user(context)?;
        Ok(get_context(context).store().list_portfolios(user))
    }

    async fn portfolio<'ctx>(&self, context: &Context<'ctx>, id: String) -> Result<Portfolio> {
        let user = current_user(context)?;
        get_context(context).store().get_portfolio(user, &id).gql()
    }

    /// Value every position at the latest quote
    async fn portfolio_performance<'ctx>(
        &self,
        context: &Context<'ctx>,
        id: String,
    ) -> Result<PortfolioPerformance> {
        let user = current_user(context)?;
        get_context(context)
            .portfolio_performance(user, &id)
            .await
            .gql()
    }

    /// The last computed performance, if it has not expired yet
    async fn cached_portfolio_performance<'ctx>(
        &self,
        context: &Context<'ctx>,
        id: String,
    ) -> Result<Option<PortfolioPerformance>> {
        let user = current_user(context)?;
        Ok(get_context(context).cached_performance(user, &id))
    }

    /// Watched symbols, newest first
    async fn watchlist<'ctx>(&self, context: &Context<'ctx>) -> Result<Vec<WatchlistItem>> {
        let user = current_user(context)?;
        Ok(get_context(context).store().watchlist(user))
    }
}
