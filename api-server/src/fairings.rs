use crate::guards::RateLimitSnapshot;
use chrono::SecondsFormat;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Request, Response};

const SECURITY_HEADERS: [(&str, &str); 5] = [
    ("X-DNS-Prefetch-Control", "on"),
    ("X-Frame-Options", "SAMEORIGIN"),
    ("X-Content-Type-Options", "nosniff"),
    ("Referrer-Policy", "strict-origin-when-cross-origin"),
    ("Permissions-Policy", "camera=(), microphone=(), geolocation=()"),
];

/// Adds the security headers to every response, plus the `X-RateLimit-*`
/// headers when the request went through a rate limit check
pub struct ResponseHeaders;

#[rocket::async_trait]
impl Fairing for ResponseHeaders {
    fn info(&self) -> Info {
        Info {
            name: "Security and rate limit headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        for (name, value) in SECURITY_HEADERS {
            response.set_header(Header::new(name, value));
        }

        if let Some(snapshot) = request.local_cache(|| None::<RateLimitSnapshot>) {
            response.set_header(Header::new("X-RateLimit-Limit", snapshot.limit.to_string()));
            response.set_header(Header::new(
                "X-RateLimit-Remaining",
                snapshot.decision.remaining.to_string(),
            ));
            response.set_header(Header::new(
                "X-RateLimit-Reset",
                snapshot
                    .decision
                    .reset_at
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            ));
        }
    }
}
