use super::ApiError;
use crate::guards::{ApiLimit, RateLimited};
use crate::models::context::ContextPointer;
use portfolio_core::funds::{FundCategory, FundRecord};
use portfolio_core::Error;
use rocket::serde::json::Json;
use rocket::{get, State};
use std::str::FromStr;

pub const DEFAULT_CATEGORY: &str = "msci_world";
pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;

pub fn parse_category(raw: Option<&str>) -> Result<FundCategory, Error> {
    let raw = raw.unwrap_or(DEFAULT_CATEGORY);
    FundCategory::from_str(raw)
        .map_err(|_| Error::invalid_field("category", format!("Unknown fund category {}", raw)))
}

#[get("/funds/rank?<category>&<limit>")]
pub async fn rank(
    category: Option<&str>,
    limit: Option<usize>,
    ctx: &State<ContextPointer>,
    _rate: RateLimited<ApiLimit>,
) -> Result<Json<Vec<FundRecord>>, ApiError> {
    let category = parse_category(category)?;
    let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(Json(ctx.ranked_funds(category, limit).await?))
}
