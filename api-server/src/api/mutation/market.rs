use super::super::{get_context, GraphQLResult};
use async_graphql::{Context, InputObject, Object, Result};
use chrono::Utc;
use log::info;
use portfolio_core::screener::InstrumentProfile;
use portfolio_core::Quote;

#[derive(InputObject)]
pub struct QuoteInput {
    pub symbol: String,
    pub current_price: f64,
    #[graphql(default)]
    pub change: f64,
    #[graphql(default)]
    pub change_percent: f64,
    #[graphql(default)]
    pub high: f64,
    #[graphql(default)]
    pub low: f64,
    #[graphql(default)]
    pub open: f64,
    #[graphql(default)]
    pub previous_close: f64,
    #[graphql(default)]
    pub volume: f64,
}

impl From<QuoteInput> for Quote {
    fn from(input: QuoteInput) -> Self {
        Quote {
            symbol: input.symbol,
            current_price: input.current_price,
            change: input.change,
            change_percent: input.change_percent,
            high: input.high,
            low: input.low,
            open: input.open,
            previous_close: input.previous_close,
            volume: input.volume,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Default)]
pub struct MarketMutation;

#[Object]
impl MarketMutation {
    /// Publish a price. Cached quotes and screener results for it are
    /// dropped and matching alerts fire.
    async fn upsert_quote<'ctx>(&self, context: &Context<'ctx>, quote: QuoteInput) -> Result<Quote> {
        get_context(context).upsert_quote(quote.into()).gql()
    }

    async fn upsert_instrument<'ctx>(
        &self,
        context: &Context<'ctx>,
        profile: InstrumentProfile,
    ) -> Result<InstrumentProfile> {
        let ctx = get_context(context);
        let profile = ctx.universe().upsert(profile).gql()?;
        ctx.screener_cache().clear();
        info!("Tracking instrument {}", profile.symbol);
        Ok(profile)
    }
}
