use super::ApiError;
use crate::guards::{QuoteLimit, RateLimited};
use crate::models::context::ContextPointer;
use portfolio_core::{Error, Quote, Symbol};
use rocket::serde::json::Json;
use rocket::{get, State};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub current_price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub previous_close: f64,
}

impl From<Quote> for QuoteResponse {
    fn from(quote: Quote) -> Self {
        Self {
            current_price: quote.current_price,
            change: quote.change,
            change_percent: quote.change_percent,
            high: quote.high,
            low: quote.low,
            open: quote.open,
            previous_close: quote.previous_close,
        }
    }
}

#[get("/quote?<symbol>")]
pub async fn quote(
    symbol: Option<&str>,
    ctx: &State<ContextPointer>,
    _rate: RateLimited<QuoteLimit>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let symbol = Symbol::parse(symbol.unwrap_or_default())?;
    let quote = ctx
        .quote(&symbol)
        .await?
        .ok_or_else(|| Error::not_found(format!("Quote for {}", symbol)))?;
    Ok(Json(quote.into()))
}
