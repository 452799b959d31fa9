//! Document download.
//!
//! [`DocumentSource`] is the capability the ingestion pipeline uses to obtain
//! raw document bytes. [`HttpSource`] performs a single GET with a bounded
//! timeout and a size cap; there is no retry, a failed download fails the
//! ingestion and the next request starts over.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unsupported document URL '{0}': only http and https are allowed")]
    UnsupportedUrl(String),
    #[error("download failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("download returned HTTP {0}")]
    Status(StatusCode),
    #[error("document exceeds the {limit}-byte download limit")]
    TooLarge { limit: u64 },
}

/// Fetches the raw bytes behind a document URL.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Plain HTTP(S) GET.
pub struct HttpSource {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpSource {
    pub fn new(timeout_secs: u64, max_bytes: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client, max_bytes })
    }
}

#[async_trait]
impl DocumentSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if !is_http_url(url) {
            return Err(FetchError::UnsupportedUrl(url.to_string()));
        }

        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes)
        {
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let mut bytes = Vec::new();
        while let Some(piece) = response.chunk().await? {
            if (bytes.len() + piece.len()) as u64 > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            bytes.extend_from_slice(&piece);
        }

        Ok(bytes)
    }
}

fn is_http_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
