use crate::models::config::FundSourceConfig;
use async_trait::async_trait;
use market_cache::fetch::fetch_with_retry;
use portfolio_core::funds::{FundCategory, FundRecord, FundSource};
use portfolio_core::Error;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use surf::Client;
use utils::query_url;
use utils::surf_logging::SurfLogging;

const MAX_ATTEMPTS: usize = 3;
const BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("status {0}")]
    Status(u16),
    #[error("{0}")]
    Transport(String),
}

impl FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Url(_) => false,
            FetchError::Status(code) => *code == 429 || *code >= 500,
            FetchError::Transport(_) => true,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FundsPayload {
    List(Vec<FundRecord>),
    Wrapped { funds: Vec<FundRecord> },
}

impl FundsPayload {
    fn into_records(self) -> Vec<FundRecord> {
        match self {
            FundsPayload::List(records) => records,
            FundsPayload::Wrapped { funds } => funds,
        }
    }
}

/// Fund backend answering `GET {base_url}/funds?category=...` with a JSON
/// list of funds
pub struct HttpFundSource {
    http: Client,
    config: FundSourceConfig,
}

impl HttpFundSource {
    pub fn new(config: FundSourceConfig) -> Self {
        Self {
            http: Client::new().with(SurfLogging),
            config,
        }
    }

    pub fn from_configs(configs: &[FundSourceConfig]) -> Vec<Arc<dyn FundSource>> {
        configs
            .iter()
            .cloned()
            .map(|config| Arc::new(HttpFundSource::new(config)) as Arc<dyn FundSource>)
            .collect()
    }

    async fn fetch_once(&self, category: FundCategory) -> Result<Vec<FundRecord>, FetchError> {
        let category = category.to_string();
        let mut params = vec![("category", category.as_str())];
        if let Some(key) = self.config.api_key() {
            params.push(("apiKey", key.as_str()));
        }
        let url = query_url::build(self.config.base_url(), "funds", &params)?;

        let mut response = self
            .http
            .get(url.as_str())
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().into()));
        }

        let payload: FundsPayload = response
            .body_json()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        Ok(payload.into_records())
    }
}

#[async_trait]
impl FundSource for HttpFundSource {
    fn name(&self) -> &str {
        self.config.name()
    }

    async fn fetch(&self, category: FundCategory) -> portfolio_core::Result<Vec<FundRecord>> {
        fetch_with_retry(MAX_ATTEMPTS, BACKOFF, FetchError::is_retryable, || {
            self.fetch_once(category)
        })
        .await
        .map(|records| {
            records
                .into_iter()
                .map(|mut record| {
                    record.data_source.get_or_insert_with(|| self.config.name().clone());
                    record
                })
                .collect()
        })
        .map_err(|err| Error::external(self.config.name().as_str(), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shapes() {
        let list: FundsPayload = serde_json::from_str(r#"[{"name": "A"}]"#).unwrap();
        assert_eq!(list.into_records().len(), 1);

        let wrapped: FundsPayload =
            serde_json::from_str(r#"{"funds": [{"name": "A"}, {"name": "B", "y1": 3.5}]}"#)
                .unwrap();
        let records = wrapped.into_records();
        assert_eq!(records[1].y1, Some(3.5));
    }

    #[test]
    fn test_retry_policy() {
        assert!(FetchError::Status(503).is_retryable());
        assert!(FetchError::Status(429).is_retryable());
        assert!(!FetchError::Status(404).is_retryable());
        assert!(FetchError::Transport("reset".into()).is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_an_external_error() {
        let source = HttpFundSource::new(FundSourceConfig::new("broken", "not a url", None));
        let err = source.fetch(FundCategory::MsciWorld).await.unwrap_err();
        assert_eq!(err.status_code(), 502);
    }
}
