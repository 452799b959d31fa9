//! Document ingestion pipeline.
//!
//! Coordinates the flow for one document URL: fingerprint → cache check →
//! download → extract → clean → chunk → embed → upsert. A document is
//! recorded in the cache only after every batch has been accepted by the
//! index; any earlier failure leaves the cache untouched so the next request
//! starts over.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::DocumentCache;
use crate::chunk::{chunk_document, clean_text};
use crate::config::{ChunkingConfig, MAX_UPSERT_BATCH};
use crate::embedding::FallbackEmbedder;
use crate::extract::{ExtractError, TextExtractor};
use crate::fetch::{DocumentSource, FetchError};
use crate::fingerprint::{document_fingerprint, FINGERPRINT_SCHEME};
use crate::index::VectorIndex;
use crate::models::{ChunkMetadata, DocumentRecord, IndexedEntry};
use crate::service::ServiceError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("download failed: {0}")]
    Download(#[from] FetchError),
    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),
    #[error("chunking failed: {0}")]
    Chunk(String),
    #[error("indexing failed: {0}")]
    Index(#[from] ServiceError),
}

/// Result of a successful [`DocumentPipeline::process`] call.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// The document was already ingested by this process.
    Cached(DocumentRecord),
    /// The document was ingested by this call.
    Ingested(DocumentRecord),
}

impl IngestOutcome {
    pub fn record(&self) -> &DocumentRecord {
        match self {
            IngestOutcome::Cached(r) | IngestOutcome::Ingested(r) => r,
        }
    }
}

pub struct DocumentPipeline {
    source: Arc<dyn DocumentSource>,
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<FallbackEmbedder>,
    index: Arc<dyn VectorIndex>,
    chunking: ChunkingConfig,
    batch_size: usize,
}

impl DocumentPipeline {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<FallbackEmbedder>,
        index: Arc<dyn VectorIndex>,
        chunking: ChunkingConfig,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            extractor,
            embedder,
            index,
            chunking,
            batch_size: batch_size.clamp(1, MAX_UPSERT_BATCH),
        }
    }

    /// Ensures the document behind `url` is indexed.
    pub async fn process(
        &self,
        url: &str,
        cache: &DocumentCache,
    ) -> Result<IngestOutcome, IngestError> {
        let fingerprint = document_fingerprint(url);
        if let Some(record) = cache.get(&fingerprint) {
            debug!(fingerprint = %fingerprint, "document already processed");
            return Ok(IngestOutcome::Cached(record));
        }

        match self.ingest(url, &fingerprint).await {
            Ok(record) => {
                info!(
                    fingerprint = %fingerprint,
                    scheme = FINGERPRINT_SCHEME,
                    chunks = record.chunk_count,
                    "document processed"
                );
                cache.insert(record.clone());
                Ok(IngestOutcome::Ingested(record))
            }
            Err(e) => {
                warn!(fingerprint = %fingerprint, url = %url, error = %e, "document ingestion failed");
                Err(e)
            }
        }
    }

    async fn ingest(&self, url: &str, fingerprint: &str) -> Result<DocumentRecord, IngestError> {
        debug!(fingerprint = %fingerprint, "downloading");
        let bytes = self.source.fetch(url).await?;

        debug!(fingerprint = %fingerprint, bytes = bytes.len(), "extracting");
        let extractor = Arc::clone(&self.extractor);
        let raw = tokio::task::spawn_blocking(move || extractor.extract(&bytes))
            .await
            .map_err(|e| ExtractError::Pdf(format!("extraction task failed: {}", e)))??;

        let text = clean_text(&raw);
        if text.is_empty() {
            return Err(ExtractError::Empty.into());
        }

        debug!(fingerprint = %fingerprint, chars = text.chars().count(), "chunking");
        let chunks = chunk_document(
            fingerprint,
            &text,
            self.chunking.max_chars,
            self.chunking.overlap_chars,
        )
        .map_err(|e| IngestError::Chunk(e.to_string()))?;

        debug!(fingerprint = %fingerprint, chunks = chunks.len(), "indexing");
        let mut entries = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let embedding = self.embedder.embed(&chunk.text).await;
            debug!(
                chunk = %chunk.id,
                source = embedding.source.as_str(),
                "embedded chunk"
            );
            entries.push(IndexedEntry {
                id: chunk.id.clone(),
                values: embedding.vector,
                metadata: ChunkMetadata {
                    text: chunk.text.clone(),
                    doc_id: fingerprint.to_string(),
                    chunk_index: chunk.chunk_index,
                    document_url: url.to_string(),
                },
            });
        }

        for batch in entries.chunks(self.batch_size) {
            self.index.upsert(batch).await?;
        }

        Ok(DocumentRecord {
            fingerprint: fingerprint.to_string(),
            url: url.to_string(),
            chunk_count: chunks.len(),
            processed_at: Utc::now(),
        })
    }
}
