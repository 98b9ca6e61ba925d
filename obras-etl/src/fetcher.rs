//! Record Fetcher
//!
//! Walks the ObrasGov `projeto-investimento` endpoint page by page until a
//! page comes back without content. Rate limiting (429), transport errors
//! and 5xx responses are absorbed by an unbounded retry of the same page;
//! no page is ever skipped. Other statuses and undecodable bodies abort the
//! fetch so a truncated extraction is never published.

use crate::error::FetchError;
use obras_common::config::ApiSettings;
use obras_common::retry::{retry, RetryDecision, RetryError, RetryPolicy};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("obras-etl/", env!("CARGO_PKG_VERSION"));

/// Anything that can yield the full raw record sequence for one run
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &'static str;

    /// All raw records, in source order
    async fn fetch_all(&self) -> Result<Vec<Value>, FetchError>;
}

/// Fixed in-memory record list (tests, replays)
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    records: Vec<Value>,
}

impl StaticSource {
    pub fn new(records: Vec<Value>) -> Self {
        Self { records }
    }
}

#[async_trait::async_trait]
impl RecordSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_all(&self) -> Result<Vec<Value>, FetchError> {
        Ok(self.records.clone())
    }
}

/// HTTP client for the ObrasGov investment-project API
pub struct ObrasGovClient {
    http_client: reqwest::Client,
    settings: ApiSettings,
}

impl ObrasGovClient {
    pub fn new(settings: ApiSettings) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| FetchError::Setup(e.to_string()))?;

        Ok(Self {
            http_client,
            settings,
        })
    }

    /// Fetch one page, returning its `content` records
    ///
    /// An absent or null `content` is an empty page.
    pub async fn fetch_page(&self, page: u32) -> Result<Vec<Value>, FetchError> {
        debug!(page, url = %self.settings.base_url, "Requesting page");

        let response = self
            .http_client
            .get(&self.settings.base_url)
            .query(&[("uf", self.settings.uf.as_str())])
            .query(&[("pagina", page)])
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                page,
                message: e.to_string(),
            })?;

        let status = response.status();

        if status.as_u16() == 429 {
            return Err(FetchError::RateLimited { page });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                page,
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|e| FetchError::Transport {
            page,
            message: e.to_string(),
        })?;

        parse_page(page, &bytes)
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::unbounded(self.settings.transport_backoff)
    }
}

/// Extract the `content` array from a page body
pub fn parse_page(page: u32, body: &[u8]) -> Result<Vec<Value>, FetchError> {
    let decode = |message: String| FetchError::Decode { page, message };

    let value: Value = serde_json::from_slice(body).map_err(|e| decode(e.to_string()))?;

    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(mut map) => match map.remove("content") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(records)) => Ok(records),
            Some(other) => Err(decode(format!(
                "`content` is not a list (found {})",
                json_kind(&other)
            ))),
        },
        other => Err(decode(format!("expected an object, found {}", json_kind(&other)))),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[async_trait::async_trait]
impl RecordSource for ObrasGovClient {
    fn name(&self) -> &'static str {
        "obrasgov-api"
    }

    async fn fetch_all(&self) -> Result<Vec<Value>, FetchError> {
        let policy = self.retry_policy();
        let rate_limit_backoff = self.settings.rate_limit_backoff;
        let transport_backoff = self.settings.transport_backoff;
        let classify = |err: &FetchError| match err.retry_delay(rate_limit_backoff, transport_backoff) {
            Some(delay) => RetryDecision::RetryAfter(delay),
            None => RetryDecision::Fail,
        };

        let mut records = Vec::new();
        let mut page = 0u32;

        loop {
            let label = format!("page {}", page);
            let content = retry(&label, &policy, classify, || self.fetch_page(page))
                .await
                .map_err(RetryError::into_inner)?;

            if content.is_empty() {
                info!(page, total = records.len(), "Empty page, extraction complete");
                break;
            }

            info!(page, records = content.len(), "Fetched page");
            records.extend(content);
            page += 1;

            if self.settings.page_delay > Duration::ZERO {
                tokio::time::sleep(self.settings.page_delay).await;
            }
        }

        Ok(records)
    }
}
