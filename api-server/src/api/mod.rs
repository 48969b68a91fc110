pub mod mutation;
pub mod query;

use crate::guards::UserId;
use crate::models::context::ContextPointer;
use async_graphql::{Context, EmptySubscription, ErrorExtensions, Schema};
use mutation::Mutation;
use query::Query;

pub type ApiSchema = Schema<Query, Mutation, EmptySubscription>;

pub fn build_schema(context: ContextPointer) -> ApiSchema {
    Schema::build(Query::default(), Mutation::default(), EmptySubscription)
        .data(context)
        .finish()
}

pub fn get_context<'ctx>(context: &Context<'ctx>) -> &'ctx ContextPointer {
    context.data_unchecked::<ContextPointer>()
}

/// User the request acts for
pub fn current_user<'ctx>(context: &Context<'ctx>) -> async_graphql::Result<&'ctx str> {
    context
        .data_opt::<UserId>()
        .map(UserId::as_str)
        .ok_or_else(|| to_graphql_error(portfolio_core::Error::unauthenticated()))
}

pub fn to_graphql_error(err: portfolio_core::Error) -> async_graphql::Error {
    if err.status_code() >= 500 {
        log::error!("GraphQL resolver failed: {}", err);
    }
    async_graphql::Error::new(err.public_message()).extend_with(|_, extensions| {
        extensions.set("code", err.code());
        extensions.set("status", i32::from(err.status_code()));
    })
}

/// Turns domain results into GraphQL results
pub trait GraphQLResult<T> {
    fn gql(self) -> async_graphql::Result<T>;
}

impl<T> GraphQLResult<T> for portfolio_core::Result<T> {
    fn gql(self) -> async_graphql::Result<T> {
        self.map_err(to_graphql_error)
    }
}
