// src/services/fetcher.rs

//! Cursor-paginated page fetching with backoff.
//!
//! The fetcher sits on top of a [`JsonTransport`], which only knows how to
//! GET a URL and return the decoded JSON tree. Rate-limit style API errors are
//! retried according to a [`BackoffPolicy`]; everything else degrades to an
//! empty page so pagination simply ends.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::error::{AppError, Result};
use crate::models::{ApiErrorBody, Page, RetryConfig};
use crate::utils::http::redact_url;

/// Query parameters of a request.
pub type Params = Vec<(String, String)>;

/// Minimal HTTP collaborator: GET a URL, return the JSON body.
///
/// Implementations must return structured API error bodies as `Ok`, so the
/// fetcher can inspect their codes. `Err` is reserved for transport failures.
#[async_trait]
pub trait JsonTransport: Send + Sync {
    async fn get_json(&self, url: &str, params: &[(String, String)]) -> Result<Value>;
}

/// Retry schedule for retryable API error codes.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Total requests made for a retryable error before giving up
    pub max_attempts: u32,
    /// Multiplied by `2^attempt`
    pub base_delay: Duration,
    /// Added to every backoff delay
    pub floor: Duration,
    /// Wait before the single retry after a transport failure
    pub transport_delay: Duration,
    pub retryable_codes: Vec<i64>,
}

impl BackoffPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_secs(config.base_delay_secs),
            floor: Duration::from_secs(config.floor_secs),
            transport_delay: Duration::from_secs(config.transport_delay_secs),
            retryable_codes: config.retryable_codes.clone(),
        }
    }

    /// Same attempt budget and codes, without any waiting.
    pub fn without_delays(mut self) -> Self {
        self.base_delay = Duration::ZERO;
        self.floor = Duration::ZERO;
        self.transport_delay = Duration::ZERO;
        self
    }

    pub fn is_retryable(&self, code: i64) -> bool {
        self.retryable_codes.contains(&code)
    }

    /// Delay after the given zero-based failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor) + self.floor
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Why a page request produced no data.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("API error {code} still failing after {attempts} attempts: {message}")]
    Exhausted {
        code: i64,
        message: String,
        attempts: u32,
    },

    #[error("API error {code}: {message}")]
    Permanent { code: i64, message: String },

    #[error("transport failure: {0}")]
    Transport(AppError),

    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Issues page requests through a transport with bounded retries.
#[derive(Clone)]
pub struct PageFetcher {
    transport: Arc<dyn JsonTransport>,
    policy: BackoffPolicy,
}

impl PageFetcher {
    pub fn new(transport: Arc<dyn JsonTransport>, policy: BackoffPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Fetch one page, degrading every failure to an empty page.
    pub async fn fetch<T: DeserializeOwned>(&self, url: &str, params: &[(String, String)]) -> Page<T> {
        match self.try_fetch(url, params).await {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Giving up on {}: {}", redact_url(url), e);
                Page::default()
            }
        }
    }

    /// Fetch one page, reporting why it failed.
    pub async fn try_fetch<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> std::result::Result<Page<T>, FetchError> {
        self.try_get(url, params).await
    }

    /// Fetch any JSON object with the same retry rules as pages.
    pub async fn try_get<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> std::result::Result<T, FetchError> {
        let mut attempts = 0u32;
        let mut transport_retried = false;

        loop {
            let value = match self.transport.get_json(url, params).await {
                Ok(value) => value,
                Err(e) if !transport_retried => {
                    transport_retried = true;
                    log::warn!("Request to {} failed ({}), retrying once", redact_url(url), e);
                    pause(self.policy.transport_delay).await;
                    continue;
                }
                Err(e) => return Err(FetchError::Transport(e)),
            };

            let Some(error) = api_error(&value) else {
                return Ok(serde_json::from_value(value)?);
            };

            if !self.policy.is_retryable(error.code) {
                return Err(FetchError::Permanent {
                    code: error.code,
                    message: error.message,
                });
            }

            attempts += 1;
            if attempts >= self.policy.max_attempts {
                return Err(FetchError::Exhausted {
                    code: error.code,
                    message: error.message,
                    attempts,
                });
            }

            let delay = self.policy.delay_for(attempts - 1);
            log::warn!(
                "API error {} on {} (attempt {}/{}), backing off {:?}",
                error.code,
                redact_url(url),
                attempts,
                self.policy.max_attempts,
                delay
            );
            pause(delay).await;
        }
    }
}

/// Extract a structured error object from a response body, if present.
fn api_error(value: &Value) -> Option<crate::models::ApiError> {
    value.get("error")?;
    serde_json::from_value::<ApiErrorBody>(value.clone())
        .ok()
        .map(|body| body.error)
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Build the query parameters of the first posts request.
pub fn first_page_params(fields: &str, token: &str, limit: usize) -> Params {
    vec![
        ("fields".to_string(), fields.to_string()),
        ("access_token".to_string(), token.to_string()),
        ("limit".to_string(), limit.to_string()),
    ]
}
