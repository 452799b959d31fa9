//! Shared HTTP plumbing for remote services.
//!
//! Every egress call (embeddings, chat completions, vector index) goes
//! through [`send_with_retry`], which applies one retry policy and sorts
//! failures into [`ServiceError`] variants:
//!
//! - HTTP 429 → [`ServiceError::RateLimited`], retried
//! - HTTP 5xx → [`ServiceError::Status`], retried
//! - other HTTP 4xx → [`ServiceError::Status`], not retried
//! - connection / timeout errors → [`ServiceError::Network`], retried
//! - undecodable bodies → [`ServiceError::Malformed`], not retried
//!
//! [`ServiceError::Unavailable`] is reserved for services that answer but are
//! not ready to take traffic (e.g. an index still initializing).
//!
//! Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5).

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("rate limited ({status}): {body}")]
    RateLimited { status: StatusCode, body: String },

    #[error("service returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Status { status, .. } if *status == StatusCode::CONFLICT)
    }
}

/// Bounded retry settings for one remote service.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    fn backoff(attempt: u32) -> Duration {
        Duration::from_secs(1 << (attempt - 1).min(5))
    }
}

/// Builds an HTTP client with a request timeout.
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ServiceError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Sends the request produced by `build`, retrying transient failures.
///
/// `build` is invoked once per attempt because a [`RequestBuilder`] is
/// consumed by `send`.
pub async fn send_with_retry<F>(policy: RetryPolicy, mut build: F) -> Result<Response, ServiceError>
where
    F: FnMut() -> RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            tokio::time::sleep(RetryPolicy::backoff(attempt)).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let body = response.text().await.unwrap_or_default();
                if status == StatusCode::TOO_MANY_REQUESTS {
                    last_err = Some(ServiceError::RateLimited { status, body });
                    continue;
                }
                if status.is_server_error() {
                    last_err = Some(ServiceError::Status { status, body });
                    continue;
                }
                return Err(ServiceError::Status { status, body });
            }
            Err(e) => {
                tracing::debug!(attempt, error = %e, "request failed");
                last_err = Some(ServiceError::Network(e));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| ServiceError::Malformed("no request attempted".to_string())))
}

/// Decodes a JSON response body.
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ServiceError::Malformed(e.to_string()))
}
