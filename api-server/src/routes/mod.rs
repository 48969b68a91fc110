pub mod funds;
pub mod graphql;
pub mod health;
pub mod quote;

use portfolio_core::{messages, Error};
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::{json, Json, Value};
use rocket::{catch, catchers, Catcher, Request, Response, Route};

/// Domain error rendered as `{"error", "code"}` with its HTTP status.
/// Upstream and storage details are logged, never returned.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = Status::from_code(self.0.status_code()).unwrap_or(Status::InternalServerError);
        if status.code >= 500 {
            log::error!("{} {} failed: {}", request.method(), request.uri(), self.0);
        } else {
            log::debug!("{} {} rejected: {}", request.method(), request.uri(), self.0);
        }

        let body = json!({
            "error": self.0.public_message(),
            "code": self.0.code(),
        });
        Response::build_from(Json(body).respond_to(request)?)
            .status(status)
            .ok()
    }
}

pub fn api_routes() -> Vec<Route> {
    rocket::routes![health::health, quote::quote, funds::rank]
}

#[catch(400)]
fn bad_request() -> Json<Value> {
    Json(json!({ "error": messages::VALIDATION_ERROR }))
}

#[catch(401)]
fn unauthorized() -> Json<Value> {
    Json(json!({ "error": messages::AUTH_FAILED }))
}

#[catch(404)]
fn not_found() -> Json<Value> {
    Json(json!({ "error": messages::NOT_FOUND }))
}

#[catch(429)]
fn too_many_requests() -> Json<Value> {
    Json(json!({ "error": messages::RATE_LIMIT_EXCEEDED }))
}

#[catch(default)]
fn default_catcher(status: Status, _request: &Request<'_>) -> Json<Value> {
    Json(json!({ "error": status.reason().unwrap_or("Unexpected error") }))
}

pub fn json_catchers() -> Vec<Catcher> {
    catchers![bad_request, unauthorized, not_found, too_many_requests, default_catcher]
}
