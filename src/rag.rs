//! Top-level orchestration of ingestion and question answering.
//!
//! [`RagSystem`] owns the document cache and both pipelines. It is shared
//! across request handlers behind an `Arc`.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::answer::AnswerGenerator;
use crate::cache::DocumentCache;
use crate::config::{ChunkingConfig, Config};
use crate::embedding::{
    ConceptEmbedding, EmbeddingStrategy, FallbackEmbedder, RemoteEmbedding,
};
use crate::extract::{PdfExtractor, TextExtractor};
use crate::fetch::{DocumentSource, HttpSource};
use crate::index::{MemoryIndex, PineconeIndex, VectorIndex};
use crate::ingest::{DocumentPipeline, IngestOutcome};
use crate::llm::{CompletionClient, OpenAiClient};
use crate::models::QueryResult;
use crate::query::QueryPipeline;

/// Answer given to every question when the document could not be ingested.
pub const INGEST_FAILED: &str = "Error: Could not process document";

/// The swappable capabilities a [`RagSystem`] is built from.
pub struct Components {
    pub source: Arc<dyn DocumentSource>,
    pub extractor: Arc<dyn TextExtractor>,
    pub embedder: Arc<FallbackEmbedder>,
    pub index: Arc<dyn VectorIndex>,
    pub llm: Arc<dyn CompletionClient>,
}

/// Tunables that do not depend on which components are plugged in.
#[derive(Debug, Clone)]
pub struct RagSettings {
    pub chunking: ChunkingConfig,
    pub top_k: usize,
    pub upsert_batch_size: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl RagSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunking: config.chunking.clone(),
            top_k: config.retrieval.top_k,
            upsert_batch_size: config.index.upsert_batch_size,
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        }
    }
}

impl Default for RagSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub processed_documents: usize,
    pub index_name: String,
}

pub struct RagSystem {
    cache: DocumentCache,
    documents: DocumentPipeline,
    queries: QueryPipeline,
    index_name: String,
}

impl RagSystem {
    pub fn new(components: Components, settings: RagSettings) -> Self {
        let Components {
            source,
            extractor,
            embedder,
            index,
            llm,
        } = components;

        let documents = DocumentPipeline::new(
            source,
            extractor,
            Arc::clone(&embedder),
            Arc::clone(&index),
            settings.chunking,
            settings.upsert_batch_size,
        );
        let generator = AnswerGenerator::new(llm, settings.temperature, settings.max_tokens);
        let index_name = index.name().to_string();
        let queries = QueryPipeline::new(embedder, index, generator, settings.top_k);

        Self {
            cache: DocumentCache::new(),
            documents,
            queries,
            index_name,
        }
    }

    /// Wires the production components described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let llm_key = config.llm.api_key()?;
        let chat = Arc::new(
            OpenAiClient::new(
                &config.llm.base_url,
                llm_key.clone(),
                config.llm.model.clone(),
                config.llm.timeout_secs,
                config.llm.max_retries,
            )
            .context("Failed to build completion client")?,
        );

        let mut tiers: Vec<Arc<dyn EmbeddingStrategy>> = Vec::new();
        if config.embedding.remote {
            let client = Arc::new(
                OpenAiClient::new(
                    &config.llm.base_url,
                    llm_key,
                    config.llm.model.clone(),
                    config.embedding.timeout_secs,
                    config.embedding.max_retries,
                )
                .context("Failed to build embedding client")?,
            );
            tiers.push(Arc::new(RemoteEmbedding::new(
                client,
                config.embedding.model.clone(),
                config.embedding.dims,
            )));
        }
        if config.embedding.concepts {
            tiers.push(Arc::new(ConceptEmbedding::new(
                chat.clone(),
                config.embedding.dims,
                config.llm.concept_max_tokens,
            )));
        }
        let embedder = Arc::new(FallbackEmbedder::new(tiers, config.embedding.dims));

        let index: Arc<dyn VectorIndex> = match config.index.provider.as_str() {
            "memory" => Arc::new(MemoryIndex::new(config.index.name.clone())),
            _ => Arc::new(
                PineconeIndex::new(&config.index, config.embedding.dims, config.index.api_key()?)
                    .context("Failed to build vector index client")?,
            ),
        };

        let source = Arc::new(
            HttpSource::new(config.download.timeout_secs, config.download.max_bytes)
                .context("Failed to build download client")?,
        );

        info!(
            index = %config.index.provider,
            name = %config.index.name,
            remote_embeddings = config.embedding.remote,
            concept_embeddings = config.embedding.concepts,
            "RAG system configured"
        );

        Ok(Self::new(
            Components {
                source,
                extractor: Arc::new(PdfExtractor),
                embedder,
                index,
                llm: chat,
            },
            RagSettings::from_config(config),
        ))
    }

    /// Ingests the document if needed, then answers each question in order.
    pub async fn answer_questions(&self, document_url: &str, questions: &[String]) -> Vec<String> {
        self.answer_questions_detailed(document_url, questions)
            .await
            .into_iter()
            .map(|r| r.answer)
            .collect()
    }

    /// Like [`answer_questions`](Self::answer_questions) but keeps confidence
    /// and source snippets.
    pub async fn answer_questions_detailed(
        &self,
        document_url: &str,
        questions: &[String],
    ) -> Vec<QueryResult> {
        match self.documents.process(document_url, &self.cache).await {
            Ok(IngestOutcome::Ingested(record)) => {
                info!(fingerprint = %record.fingerprint, chunks = record.chunk_count, "ingested new document");
            }
            Ok(IngestOutcome::Cached(_)) => {}
            Err(_) => {
                return questions
                    .iter()
                    .map(|_| QueryResult {
                        answer: INGEST_FAILED.to_string(),
                        confidence: 0.0,
                        source_chunks: Vec::new(),
                    })
                    .collect();
            }
        }

        let mut results = Vec::with_capacity(questions.len());
        for question in questions {
            results.push(self.queries.answer(question).await);
        }
        results
    }

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            processed_documents: self.cache.len(),
            index_name: self.index_name.clone(),
        }
    }
}
