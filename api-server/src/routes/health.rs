use crate::models::config::Config;
use crate::models::context::ContextPointer;
use chrono::{DateTime, Utc};
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{get, State};
use serde::Serialize;

pub const MIN_AUTH_SECRET_LENGTH: usize = 32;

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub storage: bool,
    pub auth: bool,
    pub api: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub environment: String,
    pub checks: HealthChecks,
    pub errors: Vec<String>,
}

impl HealthReport {
    /// Storage and auth are critical. A missing quote source only degrades
    /// quotes to the in-process book.
    pub fn evaluate(config: &Config, has_quote_source: bool) -> Self {
        let mut errors = Vec::new();

        if config.database_uri().is_none() {
            errors.push("DATABASE_URI is not configured (using the in-memory store)".to_string());
        }
        let storage = true;

        let auth = match config.auth_secret() {
            None => {
                errors.push("AUTH_SECRET is not configured".to_string());
                false
            }
            Some(secret) if secret.chars().count() < MIN_AUTH_SECRET_LENGTH => {
                errors.push(format!(
                    "AUTH_SECRET must be at least {} characters",
                    MIN_AUTH_SECRET_LENGTH
                ));
                false
            }
            Some(_) => true,
        };

        if !has_quote_source {
            errors.push("No quote source configured (quotes must be pushed to the quote book)".to_string());
        }

        let healthy = storage && auth;
        Self {
            status: if healthy { "healthy" } else { "unhealthy" },
            timestamp: Utc::now(),
            environment: config.environment().clone(),
            checks: HealthChecks {
                storage,
                auth,
                api: has_quote_source,
            },
            errors,
        }
    }

    pub fn status_code(&self) -> Status {
        if self.checks.storage && self.checks.auth {
            Status::Ok
        } else {
            Status::ServiceUnavailable
        }
    }
}

#[get("/health")]
pub fn health(ctx: &State<ContextPointer>) -> status::Custom<Json<HealthReport>> {
    let report = HealthReport::evaluate(ctx.config(), ctx.has_quote_source());
    status::Custom(report.status_code(), Json(report))
}
