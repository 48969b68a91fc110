use super::super::{get_context, GraphQLResult};
use crate::routes::funds::{DEFAULT_LIMIT, MAX_LIMIT};
use async_graphql::{Context, Object, Result};
use portfolio_core::funds::{categories, FundCategory, FundCategoryInfo, FundRecord};
use portfolio_core::investors::FamousInvestor;

#[derive(Default)]
pub struct FundsQuery;

#[Object]
impl FundsQuery {
    async fn fund_categories(&self) -> Vec<FundCategoryInfo> {
        categories()
    }

    /// Best scored funds of a category across every configured backend
    async fn ranked_funds<'ctx>(
        &self,
        context: &Context<'ctx>,
        category: FundCategory,
        limit: Option<usize>,
    ) -> Result<Vec<FundRecord>> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        get_context(context)
            .ranked_funds(category, limit)
            .await
            .gql()
    }

    async fn famous_investors<'ctx>(&self, context: &Context<'ctx>) -> Vec<FamousInvestor> {
        get_context(context).store().investors()
    }

    async fn famous_investor<'ctx>(&self, context: &Context<'ctx>, id: String) -> Result<FamousInvestor> {
        get_context(context).store().investor(&id).gql()
    }
}
