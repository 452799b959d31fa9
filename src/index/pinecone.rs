//! Pinecone REST backend.
//!
//! Control-plane calls go to `index.control_url`; data-plane calls go to the
//! per-index host reported by the control plane. Index creation is lazy and
//! idempotent: the first upsert or query describes the index, creates it
//! (cosine metric, configured dimension, serverless spec) when it does not
//! exist, then polls until the service reports it ready. The resolved host
//! is memoized for the life of the client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use super::VectorIndex;
use crate::config::IndexConfig;
use crate::models::{ChunkMetadata, IndexedEntry, ScoredMatch};
use crate::service::{http_client, read_json, send_with_retry, RetryPolicy, ServiceError};

pub struct PineconeIndex {
    client: reqwest::Client,
    name: String,
    control_url: String,
    api_key: String,
    api_version: String,
    cloud: String,
    region: String,
    dims: usize,
    ready_timeout: Duration,
    ready_poll: Duration,
    retry: RetryPolicy,
    host: OnceCell<String>,
}

impl PineconeIndex {
    pub fn new(config: &IndexConfig, dims: usize, api_key: String) -> Result<Self, ServiceError> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            name: config.name.clone(),
            control_url: config.control_url.trim_end_matches('/').to_string(),
            api_key,
            api_version: config.api_version.clone(),
            cloud: config.cloud.clone(),
            region: config.region.clone(),
            dims,
            ready_timeout: Duration::from_secs(config.ready_timeout_secs),
            ready_poll: Duration::from_secs(config.ready_poll_secs.max(1)),
            retry: RetryPolicy::new(config.max_retries),
            host: OnceCell::new(),
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", &self.api_version)
            .header(CONTENT_TYPE, "application/json")
    }

    /// Data-plane base URL, creating the index on first use.
    async fn data_url(&self) -> Result<&str, ServiceError> {
        self.host
            .get_or_try_init(|| async {
                let host = self.ensure_index().await?;
                Ok::<_, ServiceError>(data_plane_url(&host))
            })
            .await
            .map(String::as_str)
    }

    async fn ensure_index(&self) -> Result<String, ServiceError> {
        match self.describe().await {
            Ok(desc) if desc.is_ready() => return Ok(desc.host),
            Ok(_) => {
                tracing::info!(index = %self.name, "index exists but is not ready yet");
            }
            Err(e) if e.is_not_found() => self.create().await?,
            Err(e) => return Err(e),
        }
        self.wait_until_ready().await
    }

    async fn describe(&self) -> Result<IndexDescription, ServiceError> {
        let url = format!("{}/indexes/{}", self.control_url, self.name);
        let response = send_with_retry(self.retry, || self.request(Method::GET, &url)).await?;
        read_json(response).await
    }

    async fn create(&self) -> Result<(), ServiceError> {
        tracing::info!(
            index = %self.name,
            dims = self.dims,
            cloud = %self.cloud,
            region = %self.region,
            "creating vector index"
        );
        let url = format!("{}/indexes", self.control_url);
        let body = CreateIndexRequest {
            name: &self.name,
            dimension: self.dims,
            metric: "cosine",
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: &self.cloud,
                    region: &self.region,
                },
            },
        };

        match send_with_retry(self.retry, || self.request(Method::POST, &url).json(&body)).await {
            Ok(_) => Ok(()),
            // Another process created it between describe and create.
            Err(e) if e.is_conflict() => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn wait_until_ready(&self) -> Result<String, ServiceError> {
        let deadline = Instant::now() + self.ready_timeout;
        loop {
            match self.describe().await {
                Ok(desc) if desc.is_ready() => {
                    tracing::info!(index = %self.name, host = %desc.host, "vector index ready");
                    return Ok(desc.host);
                }
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                return Err(ServiceError::Unavailable(format!(
                    "index {} not ready after {}s",
                    self.name,
                    self.ready_timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.ready_poll).await;
        }
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, entries: &[IndexedEntry]) -> Result<(), ServiceError> {
        if entries.is_empty() {
            return Ok(());
        }
        let url = format!("{}/vectors/upsert", self.data_url().await?);
        let body = UpsertRequest {
            vectors: entries
                .iter()
                .map(|e| UpsertVector {
                    id: &e.id,
                    values: &e.values,
                    metadata: &e.metadata,
                })
                .collect(),
        };

        send_with_retry(self.retry, || self.request(Method::POST, &url).json(&body)).await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredMatch>, ServiceError> {
        let url = format!("{}/query", self.data_url().await?);
        let body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
        };

        let response =
            send_with_retry(self.retry, || self.request(Method::POST, &url).json(&body)).await?;
        let parsed: QueryResponse = read_json(response).await?;
        Ok(parsed.into_matches())
    }
}

/// Hosts are reported without a scheme; local emulators may include one.
fn data_plane_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Metadata values round-trip through the service as JSON; numbers may come
/// back as floats.
fn metadata_from_value(value: &serde_json::Value) -> Option<ChunkMetadata> {
    let text = value.get("text")?.as_str()?.to_string();
    let field = |key: &str| {
        value
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    let chunk_index = value
        .get("chunk_index")
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f as u64)))
        .unwrap_or(0) as usize;

    Some(ChunkMetadata {
        text,
        doc_id: field("doc_id"),
        chunk_index,
        document_url: field("document_url"),
    })
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    #[serde(default)]
    host: String,
    #[serde(default)]
    status: IndexStatus,
}

impl IndexDescription {
    fn is_ready(&self) -> bool {
        self.status.ready && !self.host.is_empty()
    }
}

#[derive(Debug, Default, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: IndexSpec<'a>,
}

#[derive(Serialize)]
struct IndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a ChunkMetadata,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<RawMatch>,
}

#[derive(Debug, Deserialize)]
struct RawMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

impl QueryResponse {
    fn into_matches(self) -> Vec<ScoredMatch> {
        self.matches
            .into_iter()
            .map(|m| ScoredMatch {
                metadata: m.metadata.as_ref().and_then(metadata_from_value),
                id: m.id,
                score: m.score,
            })
            .collect()
    }
}
