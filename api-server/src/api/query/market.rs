use super::super::{current_user, get_context, GraphQLResult};
use async_graphql::{Context, Object, Result};
use portfolio_core::alerts::Alert;
use portfolio_core::screener::{
    export_csv, InstrumentProfile, SavedScreener, ScreenerFilters, ScreenerRow,
};
use portfolio_core::{Quote, Symbol};

#[derive(Default)]
pub struct MarketQuery;

#[Object]
impl MarketQuery {
    async fn quote<'ctx>(&self, context: &Context<'ctx>, symbol: String) -> Result<Option<Quote>> {
        let symbol = Symbol::parse(&symbol).gql()?;
        get_context(context).quote(&symbol).await.gql()
    }

    /// Quotes for every known symbol in `symbols`, invalid ones rejected
    async fn quotes<'ctx>(&self, context: &Context<'ctx>, symbols: Vec<String>) -> Result<Vec<Quote>> {
        let symbols = symbols
            .iter()
            .map(|raw| Symbol::parse(raw))
            .collect::<portfolio_core::Result<Vec<_>>>()
            .gql()?;
        let found = get_context(context).quotes_for(&symbols).await;
        Ok(symbols
            .iter()
            .filter_map(|symbol| found.get(symbol.as_str()).cloned())
            .collect())
    }

    async fn instrument<'ctx>(
        &self,
        context: &Context<'ctx>,
        symbol: String,
    ) -> Result<Option<InstrumentProfile>> {
        let symbol = Symbol::parse(&symbol).gql()?;
        Ok(get_context(context).universe().get(symbol.as_str()))
    }

    /// Filter and sort the tracked instruments
    async fn screener<'ctx>(
        &self,
        context: &Context<'ctx>,
        filters: Option<ScreenerFilters>,
    ) -> Result<Vec<ScreenerRow>> {
        let filters = filters.unwrap_or_default();
        get_context(context).screen(&filters).await.gql()
    }

    /// Screener results as CSV
    async fn screener_csv<'ctx>(
        &self,
        context: &Context<'ctx>,
        filters: Option<ScreenerFilters>,
    ) -> Result<String> {
        let filters = filters.unwrap_or_default();
        let rows = get_context(context).screen(&filters).await.gql()?;
        Ok(export_csv(&rows))
    }

    async fn saved_screeners<'ctx>(&self, context: &Context<'ctx>) -> Result<Vec<SavedScreener>> {
        let user = current_user(context)?;
        Ok(get_context(context).store().list_screeners(user))
    }

    async fn saved_screener<'ctx>(&self, context: &Context<'ctx>, id: String) -> Result<SavedScreener> {
        let user = current_user(context)?;
        get_context(context).store().get_screener(user, &id).gql()
    }

    /// Active alerts of the current user, newest first
    async fn alerts<'ctx>(&self, context: &Context<'ctx>) -> Result<Vec<Alert>> {
        let user = current_user(context)?;
        Ok(get_context(context).store().list_alerts(user))
    }
}
