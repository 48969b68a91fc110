use chrono::Duration;
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use getset::Getters;
use log::LevelFilter;
use market_cache::{CacheConfig, RateLimitPolicy};
use serde::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "APP_";

#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
#[get = "pub"]
pub struct FundSourceConfig {
    name: String,
    base_url: String,
    #[serde(default)]
    api_key: Option<String>,
}

impl FundSourceConfig {
    pub fn new(name: &str, base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.to_string(),
            api_key: api_key.map(str::to_string),
        }
    }
}

#[serde_inline_default]
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
#[get = "pub"]
pub struct CacheSettings {
    #[serde_inline_default(60)]
    default_ttl_secs: i64,
    #[serde_inline_default(1000)]
    max_entries: usize,
    #[serde_inline_default(300)]
    cleanup_secs: i64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_secs: 60,
            max_entries: 1000,
            cleanup_secs: 300,
        }
    }
}

impl CacheSettings {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(
            Duration::seconds(self.default_ttl_secs),
            self.max_entries,
            Duration::seconds(self.cleanup_secs),
        )
    }
}

#[serde_inline_default]
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
#[get = "pub"]
pub struct RateLimitSettings {
    #[serde_inline_default(60)]
    window_secs: i64,
    #[serde_inline_default(60)]
    api_limit: u32,
    #[serde_inline_default(30)]
    quote_limit: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_secs: 60,
            api_limit: 60,
            quote_limit: 30,
        }
    }
}

impl RateLimitSettings {
    pub fn api_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(Duration::seconds(self.window_secs), self.api_limit)
    }

    pub fn quote_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(Duration::seconds(self.window_secs), self.quote_limit)
    }
}

#[serde_inline_default]
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
#[get = "pub"]
pub struct Config {
    #[serde_inline_default("development".to_string())]
    environment: String,
    /// User assumed when a request carries no `X-User-Id` outside production
    #[serde_inline_default("dev-user".to_string())]
    dev_user: String,
    #[serde(default)]
    auth_secret: Option<String>,
    #[serde(default)]
    database_uri: Option<String>,
    #[serde(default)]
    quote_source_configured: bool,
    #[serde(default)]
    fund_sources: Vec<FundSourceConfig>,
    #[serde(default)]
    cache: CacheSettings,
    #[serde(default)]
    rate_limit: RateLimitSettings,
    /// Directory for persisted session entries, memory when unset
    #[serde(default)]
    session_dir: Option<PathBuf>,
    #[serde_inline_default("info".to_string())]
    log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            dev_user: "dev-user".to_string(),
            auth_secret: None,
            database_uri: None,
            quote_source_configured: false,
            fund_sources: Vec::new(),
            cache: CacheSettings::default(),
            rate_limit: RateLimitSettings::default(),
            session_dir: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Defaults, overridden by the yaml file at `path`, overridden by
    /// `APP_` environment variables (`__` separates nested keys).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }

    pub fn with_auth_secret(mut self, secret: &str) -> Self {
        self.auth_secret = Some(secret.to_string());
        self
    }

    pub fn with_environment(mut self, environment: &str) -> Self {
        self.environment = environment.to_string();
        self
    }

    pub fn with_session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = Some(dir.into());
        self
    }

    pub fn with_rate_limit(mut self, api_limit: u32, quote_limit: u32) -> Self {
        self.rate_limit.api_limit = api_limit;
        self.rate_limit.quote_limit = quote_limit;
        self
    }
}
