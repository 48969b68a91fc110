use super::super::{current_user, get_context, GraphQLResult};
use async_graphql::{Context, Object, Result};

#[derive(Default)]
pub struct WatchlistMutation;

#[Object]
impl WatchlistMutation {
    /// False when the symbol was already watched
    async fn add_to_watchlist<'ctx>(&self, context: &Context<'ctx>, symbol: String) -> Result<bool> {
        let user = current_user(context)?;
        get_context(context)
            .store()
            .add_to_watchlist(user, &symbol)
            .gql()
    }

    async fn remove_from_watchlist<'ctx>(
        &self,
        context: &Context<'ctx>,
        symbol: String,
    ) -> Result<bool> {
        let user = current_user(context)?;
        get_context(context)
            .store()
            .remove_from_watchlist(user, &symbol)
            .gql()
    }
}
