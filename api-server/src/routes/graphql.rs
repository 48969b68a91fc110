use crate::api::ApiSchema;
use crate::guards::{ApiLimit, RateLimited, UserId};
use async_graphql::http::GraphiQLSource;
use async_graphql_rocket::{GraphQLRequest, GraphQLResponse};
use rocket::response::content::RawHtml;
use rocket::{get, post, routes, Route, State};

#[get("/graphql")]
fn graphiql() -> RawHtml<String> {
    RawHtml(GraphiQLSource::build().endpoint("/graphql").finish())
}

#[post("/graphql", data = "<request>", format = "application/json")]
async fn graphql_request(
    schema: &State<ApiSchema>,
    user: Option<UserId>,
    _rate: RateLimited<ApiLimit>,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let request = match user {
        Some(user) => request.data(user),
        None => request,
    };
    request.execute(schema.inner()).await
}

pub fn graphql_routes() -> Vec<Route> {
    routes![graphiql, graphql_request]
}
