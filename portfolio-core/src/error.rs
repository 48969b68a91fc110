use std::fmt;

/// Machine readable category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ValidationError,
    AuthError,
    AuthorizationError,
    NotFound,
    RateLimitError,
    ExternalApiError,
    StorageError,
    UnknownError,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::ValidationError => 400,
            ErrorKind::AuthError => 401,
            ErrorKind::AuthorizationError => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::RateLimitError => 429,
            ErrorKind::ExternalApiError => 502,
            ErrorKind::StorageError | ErrorKind::UnknownError => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    Authorization(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    RateLimit(String),
    #[error("{service}: {message}")]
    ExternalApi { service: String, message: String },
    #[error("{0}")]
    Storage(String),
    #[error("{0}")]
    Unknown(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Error::NotFound(resource.into())
    }

    pub fn external(service: impl Into<String>, err: impl fmt::Display) -> Self {
        Error::ExternalApi {
            service: service.into(),
            message: err.to_string(),
        }
    }

    pub fn unauthenticated() -> Self {
        Error::Authentication("Authentication failed".to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::ValidationError,
            Error::Authentication(_) => ErrorKind::AuthError,
            Error::Authorization(_) => ErrorKind::AuthorizationError,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::RateLimit(_) => ErrorKind::RateLimitError,
            Error::ExternalApi { .. } => ErrorKind::ExternalApiError,
            Error::Storage(_) => ErrorKind::StorageError,
            Error::Unknown(_) => ErrorKind::UnknownError,
        }
    }

    /// Stable error code, e.g. `VALIDATION_ERROR`
    pub fn code(&self) -> &'static str {
        self.kind().into()
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Message that is safe to show to an API client. Upstream and storage
    /// details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Error::ExternalApi { .. } => messages::EXTERNAL_API_ERROR.to_string(),
            Error::Storage(_) => messages::DATABASE_ERROR.to_string(),
            Error::RateLimit(_) => messages::RATE_LIMIT_EXCEEDED.to_string(),
            Error::Unknown(_) => "An unexpected error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<market_cache::CacheError> for Error {
    fn from(err: market_cache::CacheError) -> Self {
        Error::external("cache", err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client facing messages
pub mod messages {
    pub const AUTH_FAILED: &str = "Authentication failed. Please check your credentials.";
    pub const INVALID_SYMBOL: &str = "Invalid symbol format. Symbols must be 1-10 characters and contain only letters, numbers, dots, and hyphens.";
    pub const MISSING_API_KEY: &str = "API key not configured. Please check your environment variables.";
    pub const RATE_LIMIT_EXCEEDED: &str = "Rate limit exceeded. Please try again later.";
    pub const DATABASE_ERROR: &str = "Database connection failed. Please try again later.";
    pub const EXTERNAL_API_ERROR: &str = "Failed to fetch data from external service.";
    pub const NOT_FOUND: &str = "Resource not found.";
    pub const VALIDATION_ERROR: &str = "Invalid input data.";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        let err = Error::invalid_field("shares", "must not be negative");
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "must not be negative");

        let err = Error::not_found("Portfolio");
        assert_eq!(err.to_string(), "Portfolio not found");
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(err.status_code(), 404);

        assert_eq!(Error::unauthenticated().code(), "AUTH_ERROR");
        assert_eq!(Error::RateLimit("x".into()).status_code(), 429);
    }

    #[test]
    fn test_public_message_hides_upstream_details() {
        let err = Error::external("finnhub", "401 invalid token=abc");
        assert_eq!(err.status_code(), 502);
        assert_eq!(err.public_message(), messages::EXTERNAL_API_ERROR);
        assert!(err.to_string().contains("token=abc"));
    }
}
