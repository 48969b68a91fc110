use super::super::{current_user, get_context, GraphQLResult};
use async_graphql::{Context, Object, Result};
use portfolio_core::screener::{SavedScreener, ScreenerFilters};

#[derive(Default)]
pub struct ScreenerMutation;

#[Object]
impl ScreenerMutation {
    /// Names are unique per user
    async fn save_screener<'ctx>(
        &self,
        context: &Context<'ctx>,
        name: String,
        description: Option<String>,
        filters: ScreenerFilters,
    ) -> Result<SavedScreener> {
        let user = current_user(context)?;
        get_context(context)
            .store()
            .save_screener(user, &name, description.as_deref(), filters)
            .gql()
    }

    async fn delete_screener<'ctx>(&self, context: &Context<'ctx>, id: String) -> Result<bool> {
        let user = current_user(context)?;
        get_context(context).store().delete_screener(user, &id).gql()?;
        Ok(true)
    }
}
