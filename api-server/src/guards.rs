use crate::models::config::RateLimitSettings;
use crate::models::context::ContextPointer;
use lazy_static::lazy_static;
use market_cache::{RateLimitDecision, RateLimitPolicy};
use portfolio_core::{messages, Error};
use regex::Regex;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use std::convert::Infallible;
use std::marker::PhantomData;

pub const USER_HEADER: &str = "X-User-Id";

lazy_static! {
    static ref USER_ID_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9_.@-]{1,128}$").unwrap();
}

fn context<'r>(request: &'r Request<'_>) -> Option<&'r ContextPointer> {
    request.rocket().state::<ContextPointer>()
}

/// Caller address, taken from the proxy headers when present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    fn of(request: &Request<'_>) -> Self {
        let headers = request.headers();
        let forwarded = headers
            .get_one("X-Forwarded-For")
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let real_ip = headers
            .get_one("X-Real-IP")
            .map(str::trim)
            .filter(|value| !value.is_empty());

        let ip = forwarded
            .or(real_ip)
            .map(str::to_string)
            .or_else(|| request.client_ip().map(|ip| ip.to_string()))
            .unwrap_or_else(|| "unknown".to_string());
        ClientIp(ip)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(ClientIp::of(request))
    }
}

/// A budget of requests per window, shared by every route of the class
pub trait LimitClass: Send + Sync + 'static {
    const SCOPE: &'static str;

    fn policy(settings: &RateLimitSettings) -> RateLimitPolicy;
}

pub struct ApiLimit;

impl LimitClass for ApiLimit {
    const SCOPE: &'static str = "api";

    fn policy(settings: &RateLimitSettings) -> RateLimitPolicy {
        settings.api_policy()
    }
}

pub struct QuoteLimit;

impl LimitClass for QuoteLimit {
    const SCOPE: &'static str = "quote";

    fn policy(settings: &RateLimitSettings) -> RateLimitPolicy {
        settings.quote_policy()
    }
}

/// Outcome of the rate limit check of the current request, turned into
/// `X-RateLimit-*` headers on the way out
#[derive(Debug, Clone)]
pub struct RateLimitSnapshot {
    pub limit: u32,
    pub decision: RateLimitDecision,
}

/// Admits the request if its client still has budget in class `C`
pub struct RateLimited<C>(PhantomData<C>);

#[rocket::async_trait]
impl<'r, C: LimitClass> FromRequest<'r> for RateLimited<C> {
    type Error = Error;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(ctx) = context(request) else {
            return Outcome::Error((
                Status::InternalServerError,
                Error::Unknown("server context missing".to_string()),
            ));
        };

        let ClientIp(ip) = ClientIp::of(request);
        let policy = C::policy(ctx.config().rate_limit());
        let decision = ctx
            .rate_limiter()
            .check_policy(&format!("{}:{}", C::SCOPE, ip), policy);

        let allowed = decision.allowed;
        request.local_cache(|| {
            Some(RateLimitSnapshot {
                limit: policy.limit,
                decision,
            })
        });

        if allowed {
            Outcome::Success(RateLimited(PhantomData))
        } else {
            log::info!("Rate limit ({}) exceeded for {}", C::SCOPE, ip);
            Outcome::Error((
                Status::TooManyRequests,
                Error::RateLimit(messages::RATE_LIMIT_EXCEEDED.to_string()),
            ))
        }
    }
}

/// The user a request acts for. Outside production a request without
/// `X-User-Id` acts for the configured development user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserId {
    type Error = Error;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(ctx) = context(request) else {
            return Outcome::Error((
                Status::InternalServerError,
                Error::Unknown("server context missing".to_string()),
            ));
        };

        match request.headers().get_one(USER_HEADER).map(str::trim) {
            Some(id) if USER_ID_PATTERN.is_match(id) => Outcome::Success(UserId(id.to_string())),
            Some(_) => Outcome::Error((
                Status::BadRequest,
                Error::invalid_field("userId", "Invalid user id"),
            )),
            None if ctx.config().is_production() => {
                Outcome::Error((Status::Unauthorized, Error::unauthenticated()))
            }
            None => Outcome::Success(UserId(ctx.config().dev_user().clone())),
        }
    }
}
