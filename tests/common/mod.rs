//! In-process fakes for the capability traits.

#![allow(dead_code)]

use async_trait::async_trait;
use docqa::embedding::{EmbeddingSource, EmbeddingStrategy, FallbackEmbedder};
use docqa::extract::{ExtractError, TextExtractor};
use docqa::fetch::{DocumentSource, FetchError};
use docqa::index::MemoryIndex;
use docqa::llm::{CompletionClient, CompletionRequest};
use docqa::rag::{Components, RagSettings, RagSystem};
use docqa::service::ServiceError;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DIMS: usize = 64;

// ─── Document source ────────────────────────────────────────────────

/// Serves fixed bodies by URL and counts downloads. The first
/// `failures` calls return HTTP 503.
pub struct CountingSource {
    bodies: HashMap<String, String>,
    failures: AtomicUsize,
    calls: AtomicUsize,
}

impl CountingSource {
    pub fn new(docs: &[(&str, &str)]) -> Self {
        Self {
            bodies: docs
                .iter()
                .map(|(u, b)| (u.to_string(), b.to_string()))
                .collect(),
            failures: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(self, n: usize) -> Self {
        self.failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSource for CountingSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(FetchError::Status(StatusCode::SERVICE_UNAVAILABLE));
        }
        self.bodies
            .get(url)
            .map(|b| b.as_bytes().to_vec())
            .ok_or(FetchError::Status(StatusCode::NOT_FOUND))
    }
}

// ─── Extractor ──────────────────────────────────────────────────────

/// Treats the downloaded bytes as UTF-8 text.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        String::from_utf8(bytes.to_vec()).map_err(|e| ExtractError::Pdf(e.to_string()))
    }
}

// ─── Embedding tiers ────────────────────────────────────────────────

/// A remote tier that is always down.
pub struct UnreachableEmbedding {
    pub attempts: AtomicUsize,
}

impl UnreachableEmbedding {
    pub fn new() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingStrategy for UnreachableEmbedding {
    fn source(&self) -> EmbeddingSource {
        EmbeddingSource::Remote
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ServiceError::Unavailable("embedding service down".to_string()))
    }
}

// ─── Language model ─────────────────────────────────────────────────

/// Answers with the first context chunk of the prompt and records
/// every question it was asked.
pub struct EchoLlm {
    pub questions: Mutex<Vec<String>>,
}

impl EchoLlm {
    pub fn new() -> Self {
        Self {
            questions: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CompletionClient for EchoLlm {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ServiceError> {
        if let Some(q) = request
            .user
            .lines()
            .find_map(|l| l.strip_prefix("Question: "))
        {
            self.questions.lock().unwrap().push(q.to_string());
        }
        // Line 0 is the header, line 1 the opening separator.
        Ok(request.user.lines().nth(2).unwrap_or_default().to_string())
    }
}

/// Panics on every call, standing in for a bug inside the pipeline.
pub struct PanickingLlm;

#[async_trait]
impl CompletionClient for PanickingLlm {
    async fn complete(&self, _request: &CompletionRequest<'_>) -> Result<String, ServiceError> {
        panic!("completion backend exploded");
    }
}

// ─── Assembly ───────────────────────────────────────────────────────

pub struct Harness {
    pub rag: Arc<RagSystem>,
    pub source: Arc<CountingSource>,
    pub index: Arc<MemoryIndex>,
    pub llm: Arc<EchoLlm>,
}

pub fn harness(source: CountingSource) -> Harness {
    harness_with_tiers(source, Vec::new())
}

pub fn harness_with_tiers(
    source: CountingSource,
    tiers: Vec<Arc<dyn EmbeddingStrategy>>,
) -> Harness {
    let source = Arc::new(source);
    let index = Arc::new(MemoryIndex::new("test-index"));
    let llm = Arc::new(EchoLlm::new());
    let rag = assemble(source.clone(), index.clone(), tiers, llm.clone());

    Harness {
        rag,
        source,
        index,
        llm,
    }
}

/// A system over `source` whose answers come from `llm`.
pub fn rag_with_llm(source: CountingSource, llm: Arc<dyn CompletionClient>) -> Arc<RagSystem> {
    assemble(
        Arc::new(source),
        Arc::new(MemoryIndex::new("test-index")),
        Vec::new(),
        llm,
    )
}

fn assemble(
    source: Arc<CountingSource>,
    index: Arc<MemoryIndex>,
    tiers: Vec<Arc<dyn EmbeddingStrategy>>,
    llm: Arc<dyn CompletionClient>,
) -> Arc<RagSystem> {
    Arc::new(RagSystem::new(
        Components {
            source,
            extractor: Arc::new(PlainTextExtractor),
            embedder: Arc::new(FallbackEmbedder::new(tiers, DIMS)),
            index,
            llm,
        },
        RagSettings::default(),
    ))
}
